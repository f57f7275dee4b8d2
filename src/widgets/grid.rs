use crate::app::Effect;
use crate::fleet_core::focus::FocusCycle;
use crate::nav::keys::{nav_input, NavInput};
use crate::widgets::Widget;
use crossterm::event::KeyCode;
use ratatui::prelude::*;

#[derive(Debug, Clone, Copy)]
pub struct GridPos {
    pub row: u16,
    pub col: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct GridSpan {
    pub rows: u16,
    pub cols: u16,
}

impl GridSpan {
    pub fn single() -> Self {
        Self { rows: 1, cols: 1 }
    }
}

struct GridMember {
    widget: Box<dyn Widget>,
    pos: GridPos,
    span: GridSpan,
}

/// Composite container placing members on a fixed row/column grid.
/// Tab/BackTab cycle input focus among the focusable members; every other
/// key goes to the currently focused member.
pub struct FocusGrid {
    rows: u16,
    cols: u16,
    members: Vec<GridMember>,
    focus: FocusCycle,
    help_text: String,
}

impl FocusGrid {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows: rows.max(1),
            cols: cols.max(1),
            members: Vec::new(),
            focus: FocusCycle::new(),
            help_text: "No help available for this panel.".to_string(),
        }
    }

    pub fn with_help(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    pub fn help_text(&self) -> &str {
        &self.help_text
    }

    /// Appends a member at `pos`; with `focus` the new member immediately
    /// takes the cursor (provided it can take focus at all).
    pub fn add_member(
        &mut self,
        widget: Box<dyn Widget>,
        pos: GridPos,
        span: GridSpan,
        focus: bool,
    ) {
        let idx = self.focus.push(widget.focusable());
        if focus {
            self.focus.set_current(idx);
        }
        self.members.push(GridMember { widget, pos, span });
    }

    pub fn focused_index(&self) -> Option<usize> {
        self.focus.focused()
    }

    pub fn focus_next(&mut self) -> Option<usize> {
        self.focus.next()
    }

    pub fn focus_prev(&mut self) -> Option<usize> {
        self.focus.prev()
    }

    pub fn member_mut(&mut self, idx: usize) -> Option<&mut Box<dyn Widget>> {
        self.members.get_mut(idx).map(|m| &mut m.widget)
    }

    pub fn focused_widget_mut(&mut self) -> Option<&mut Box<dyn Widget>> {
        let idx = self.focus.focused()?;
        self.member_mut(idx)
    }

    fn member_rect(&self, area: Rect, pos: GridPos, span: GridSpan) -> Rect {
        let cell_w = area.width / self.cols;
        let cell_h = area.height / self.rows;
        let x = area.x.saturating_add(pos.col.saturating_mul(cell_w));
        let y = area.y.saturating_add(pos.row.saturating_mul(cell_h));
        let w = cell_w.saturating_mul(span.cols).min(area.right().saturating_sub(x));
        let h = cell_h.saturating_mul(span.rows).min(area.bottom().saturating_sub(y));
        Rect {
            x,
            y,
            width: w,
            height: h,
        }
    }
}

impl Widget for FocusGrid {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64) {
        let focus_idx = self.focus.focused();
        for i in 0..self.members.len() {
            let (pos, span) = {
                let m = &self.members[i];
                (m.pos, m.span)
            };
            let rect = self.member_rect(area, pos, span);
            if rect.width == 0 || rect.height == 0 {
                continue;
            }
            let member_focused = focused && focus_idx == Some(i);
            self.members[i].widget.render(f, rect, member_focused, tick);
        }
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        match nav_input(key) {
            Some(NavInput::Next) => {
                self.focus_next();
                Vec::new()
            }
            Some(NavInput::Previous) => {
                self.focus_prev();
                Vec::new()
            }
            _ => self
                .focused_widget_mut()
                .map(|w| w.on_key(key))
                .unwrap_or_default(),
        }
    }

    fn focusable(&self) -> bool {
        self.members.iter().any(|m| m.widget.focusable())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
