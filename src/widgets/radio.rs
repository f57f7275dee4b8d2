use crate::app::Effect;
use crate::widgets::chrome::panel_block;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

struct RadioOption {
    label: String,
    enabled: bool,
}

/// Focusable list of mutually exclusive options. Navigation skips disabled
/// options and scans at most `len` slots, so it terminates even with every
/// option disabled (in which case the selection does not move).
pub struct RadioButtons {
    title: String,
    options: Vec<RadioOption>,
    current: usize,
}

impl RadioButtons {
    pub fn new(
        title: impl Into<String>,
        labels: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            title: title.into(),
            options: labels
                .into_iter()
                .map(|l| RadioOption {
                    label: l.into(),
                    enabled: true,
                })
                .collect(),
            current: 0,
        }
    }

    pub fn current_label(&self) -> Option<&str> {
        self.options.get(self.current).map(|o| o.label.as_str())
    }

    /// Advances the selection, wrapping; returns whether it moved.
    pub fn select_next(&mut self) -> bool {
        self.scan(1)
    }

    /// Retreats the selection, wrapping; returns whether it moved.
    pub fn select_prev(&mut self) -> bool {
        self.scan(self.options.len().wrapping_sub(1))
    }

    fn scan(&mut self, delta: usize) -> bool {
        let len = self.options.len();
        if len == 0 {
            return false;
        }
        let start = self.current;
        let mut idx = self.current;
        for _ in 0..len {
            idx = (idx + delta) % len;
            if self.options[idx].enabled {
                self.current = idx;
                return idx != start;
            }
        }
        false
    }

    /// Marks the named option non-selectable. The current selection stays
    /// where it is even if it just became disabled; the next navigation
    /// input scans away from it.
    pub fn disable_option(&mut self, label: &str) -> bool {
        match self.options.iter_mut().find(|o| o.label == label) {
            Some(opt) => {
                opt.enabled = false;
                true
            }
            None => false,
        }
    }

    #[allow(dead_code)]
    pub fn disable_option_at(&mut self, idx: usize) {
        if let Some(opt) = self.options.get_mut(idx) {
            opt.enabled = false;
        }
    }
}

impl crate::widgets::Widget for RadioButtons {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        let theme = crate::theme::Theme::default();
        let lines: Vec<Line> = self
            .options
            .iter()
            .enumerate()
            .map(|(idx, opt)| {
                let marker = if idx == self.current && opt.enabled {
                    "\u{25c9}" // filled
                } else {
                    "\u{25ef}" // hollow
                };
                let style = if opt.enabled {
                    Style::default().fg(theme.fg)
                } else {
                    theme.text_muted()
                };
                Line::from(Span::styled(format!("{marker} {}", opt.label), style))
            })
            .collect();
        let p = Paragraph::new(lines).block(panel_block(&self.title, focused));
        f.render_widget(p, area);
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        let moved = match key {
            KeyCode::Up | KeyCode::Char('k') => self.select_prev(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            _ => false,
        };
        if moved {
            if let Some(label) = self.current_label() {
                return vec![Effect::OptionSelected {
                    label: label.to_string(),
                }];
            }
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
