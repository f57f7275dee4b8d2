use crate::app::Effect;
use crate::model::InstanceRecord;
use crate::widgets::chrome::panel_block;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, Wrap};
use serde_json::Value as JsonValue;

/// Detail page for one instance record: a colorized walk of the raw
/// envelope item, with a raw-JSON toggle and clipboard yank.
pub struct RecordViewerWidget {
    title: String,
    json_pretty: String,
    value: JsonValue,
    mode_raw: bool,
    wrap: bool,
    scroll_y: u16,
    last_viewport_h: u16,
}

impl RecordViewerWidget {
    pub fn new(record: &InstanceRecord) -> Self {
        let value = if record.raw.is_null() {
            // Sources that bypass the CLI envelope still get a usable view
            serde_json::json!({
                "id": record.id,
                "name": record.name,
                "state": record.state,
                "instance_type": record.instance_type,
                "zone": record.zone,
                "launch_time": record.launch_time,
            })
        } else {
            record.raw.clone()
        };
        let json_pretty =
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        Self {
            title: format!("Instance {}", record.id),
            json_pretty,
            value,
            mode_raw: false,
            wrap: false,
            scroll_y: 0,
            last_viewport_h: 0,
        }
    }

    fn render_value(&self, v: &JsonValue, indent: usize, lines: &mut Vec<Line<'static>>) {
        let theme = crate::theme::Theme::default();
        let pad = " ".repeat(indent);
        match v {
            JsonValue::Object(map) => {
                for (k, val) in map {
                    match val {
                        JsonValue::Object(_) | JsonValue::Array(_) => {
                            lines.push(Line::from(vec![
                                Span::raw(pad.clone()),
                                Span::styled(
                                    format!("{k}:"),
                                    Style::default().fg(Color::Cyan),
                                ),
                            ]));
                            self.render_value(val, indent + 2, lines);
                        }
                        _ => {
                            lines.push(Line::from(vec![
                                Span::raw(pad.clone()),
                                Span::styled(
                                    format!("{k}: "),
                                    Style::default().fg(Color::Cyan),
                                ),
                                value_span(val, &theme),
                            ]));
                        }
                    }
                }
            }
            JsonValue::Array(arr) => {
                for item in arr {
                    match item {
                        JsonValue::Object(_) | JsonValue::Array(_) => {
                            lines.push(Line::from(vec![Span::raw(pad.clone()), Span::raw("• ")]));
                            self.render_value(item, indent + 2, lines);
                        }
                        _ => {
                            lines.push(Line::from(vec![
                                Span::raw(pad.clone()),
                                Span::raw("• "),
                                value_span(item, &theme),
                            ]));
                        }
                    }
                }
            }
            _ => {
                lines.push(Line::from(vec![Span::raw(pad), value_span(v, &theme)]));
            }
        }
    }
}

fn value_span(v: &JsonValue, theme: &crate::theme::Theme) -> Span<'static> {
    match v {
        JsonValue::Null => Span::styled("null", theme.text_muted()),
        JsonValue::Bool(b) => Span::styled(b.to_string(), Style::default().fg(Color::Magenta)),
        JsonValue::Number(n) => Span::styled(n.to_string(), Style::default().fg(Color::Yellow)),
        JsonValue::String(s) => Span::styled(s.clone(), Style::default().fg(Color::Green)),
        other => Span::raw(other.to_string()),
    }
}

impl crate::widgets::Widget for RecordViewerWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        let theme = crate::theme::Theme::default();
        let mut lines: Vec<Line> = Vec::new();
        if self.mode_raw {
            for l in self.json_pretty.lines() {
                lines.push(Line::from(l.to_string()));
            }
        } else {
            lines.push(Line::from(Span::styled(
                "j raw  •  y yank  •  Esc back",
                theme.text_muted(),
            )));
            self.render_value(&self.value, 0, &mut lines);
        }
        self.last_viewport_h = area.height.saturating_sub(2);
        let total = lines.len() as u16;
        let max_scroll = total.saturating_sub(self.last_viewport_h);
        if self.scroll_y > max_scroll {
            self.scroll_y = max_scroll;
        }
        let p = Paragraph::new(lines)
            .block(panel_block(&self.title, focused))
            .wrap(Wrap { trim: !self.wrap })
            .scroll((self.scroll_y, 0));
        f.render_widget(p, area);
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        match key {
            KeyCode::Up => {
                if self.scroll_y > 0 {
                    self.scroll_y -= 1;
                }
            }
            KeyCode::Down => self.scroll_y = self.scroll_y.saturating_add(1),
            KeyCode::PageUp => {
                self.scroll_y = self.scroll_y.saturating_sub(self.last_viewport_h);
            }
            KeyCode::PageDown => {
                self.scroll_y = self.scroll_y.saturating_add(self.last_viewport_h);
            }
            KeyCode::Home => self.scroll_y = 0,
            KeyCode::End => {
                let total = self.json_pretty.lines().count() as u16;
                self.scroll_y = total.saturating_sub(self.last_viewport_h);
            }
            KeyCode::Char('w') | KeyCode::Char('W') => self.wrap = !self.wrap,
            KeyCode::Char('j') | KeyCode::Char('J') => {
                self.mode_raw = !self.mode_raw;
                self.scroll_y = 0;
            }
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Ok(mut clipboard) = arboard::Clipboard::new() {
                    let _ = clipboard.set_text(&self.json_pretty);
                    return vec![Effect::ShowStatus {
                        text: "Copied to clipboard!".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::Widget as _;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn record() -> InstanceRecord {
        InstanceRecord {
            id: "i-0042".into(),
            state: "running".into(),
            raw: serde_json::json!({
                "id": "i-0042",
                "state": "running",
                "tags": ["web", "prod"],
                "billing": {"tier": "spot", "hourly": 0.17}
            }),
            ..Default::default()
        }
    }

    #[test]
    fn end_jumps_to_bottom_and_j_toggles_raw() {
        let mut w = RecordViewerWidget::new(&record());
        let backend = TestBackend::new(40, 8);
        let mut terminal = Terminal::new(backend).unwrap();
        let _ = terminal.draw(|f| {
            let area = Rect {
                x: 0,
                y: 0,
                width: 40,
                height: 8,
            };
            w.render(f, area, true, 0);
        });
        let _ = w.on_key(KeyCode::End);
        let expected = (w.json_pretty.lines().count() as u16).saturating_sub(w.last_viewport_h);
        assert_eq!(w.scroll_y, expected);

        assert!(!w.mode_raw);
        let _ = w.on_key(KeyCode::Char('j'));
        assert!(w.mode_raw);
        assert_eq!(w.scroll_y, 0);
    }

    #[test]
    fn falls_back_to_typed_fields_without_a_raw_envelope() {
        let rec = InstanceRecord {
            id: "i-bare".into(),
            state: "stopped".into(),
            ..Default::default()
        };
        let w = RecordViewerWidget::new(&rec);
        assert!(w.json_pretty.contains("i-bare"));
        assert!(w.json_pretty.contains("stopped"));
    }
}
