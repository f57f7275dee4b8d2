use std::collections::HashMap;

use crate::app::Effect;
use crate::model::{HealthStatus, InstanceHealth, InstanceRecord};
use crate::services::dispatch::UpdatePayload;
use crate::widgets::chrome::panel_block;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Cell, Row, Table, TableState};

/// Instances table: the page-facing consumer of inventory updates. Health
/// rows are joined onto the listing by instance id; an optional state
/// filter narrows what is shown.
pub struct InstancesWidget {
    records: Vec<InstanceRecord>,
    health: HashMap<String, InstanceHealth>,
    state_filter: Option<String>,
    table: TableState,
}

impl Default for InstancesWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl InstancesWidget {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            health: HashMap::new(),
            state_filter: None,
            table: TableState::default(),
        }
    }

    /// Applies one drained update. Listings replace the table wholesale;
    /// health refreshes the join map. Returns how many items arrived.
    pub fn apply_update(&mut self, payload: UpdatePayload) -> usize {
        match payload {
            UpdatePayload::Instances(records) => {
                let n = records.len();
                self.records = records;
                self.clamp_selection();
                n
            }
            UpdatePayload::Health(statuses) => {
                let n = statuses.len();
                self.health = statuses.into_iter().map(|h| (h.id.clone(), h)).collect();
                n
            }
        }
    }

    pub fn set_state_filter(&mut self, filter: Option<String>) {
        self.state_filter = filter;
        self.clamp_selection();
    }

    fn visible(&self) -> Vec<&InstanceRecord> {
        self.records
            .iter()
            .filter(|r| match &self.state_filter {
                Some(state) => r.state == *state,
                None => true,
            })
            .collect()
    }

    pub fn visible_count(&self) -> usize {
        self.visible().len()
    }

    pub fn selected_record(&self) -> Option<&InstanceRecord> {
        let rows = self.visible();
        rows.get(self.table.selected()?).copied()
    }

    fn clamp_selection(&mut self) {
        let count = self.visible_count();
        match self.table.selected() {
            _ if count == 0 => self.table.select(None),
            None => self.table.select(Some(0)),
            Some(sel) if sel >= count => self.table.select(Some(count - 1)),
            Some(_) => {}
        }
    }

    fn select_delta(&mut self, down: bool) {
        let count = self.visible_count();
        if count == 0 {
            return;
        }
        let sel = self.table.selected().unwrap_or(0);
        let next = if down {
            (sel + 1).min(count - 1)
        } else {
            sel.saturating_sub(1)
        };
        self.table.select(Some(next));
    }

    fn health_of(&self, id: &str) -> HealthStatus {
        self.health
            .get(id)
            .map(|h| h.status)
            .unwrap_or(HealthStatus::Unknown)
    }
}

impl crate::widgets::Widget for InstancesWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        let theme = crate::theme::Theme::default();
        let header = Row::new(["ID", "NAME", "STATE", "TYPE", "ZONE", "HEALTH"])
            .style(theme.text_accent_bold());
        let rows: Vec<Row> = self
            .visible()
            .iter()
            .map(|r| {
                let health = self.health_of(&r.id);
                let state_style = if r.state == "running" {
                    Style::default().fg(theme.success)
                } else {
                    theme.text_muted()
                };
                Row::new(vec![
                    Cell::from(r.id.clone()),
                    Cell::from(r.name.clone().unwrap_or_default()),
                    Cell::from(r.state.clone()).style(state_style),
                    Cell::from(r.instance_type.clone().unwrap_or_default()),
                    Cell::from(r.zone.clone().unwrap_or_default()),
                    Cell::from(health.label())
                        .style(Style::default().fg(theme.health_color(health))),
                ])
            })
            .collect();
        let title = match &self.state_filter {
            Some(state) => format!("Instances ({}, {state})", self.visible_count()),
            None => format!("Instances ({})", self.visible_count()),
        };
        let widths = [
            Constraint::Length(20),
            Constraint::Min(12),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(13),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(panel_block(&title, focused))
            .row_highlight_style(theme.list_cursor_style());
        f.render_stateful_widget(table, area, &mut self.table);
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        match key {
            KeyCode::Up | KeyCode::Char('k') => self.select_delta(false),
            KeyCode::Down | KeyCode::Char('j') => self.select_delta(true),
            KeyCode::Enter => {
                if let Some(record) = self.selected_record() {
                    return vec![Effect::OpenDetail {
                        record: record.clone(),
                    }];
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
