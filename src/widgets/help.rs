use crate::app::Effect;
use crate::widgets::chrome::panel_block;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, Wrap};

/// Overlay page shown by `PageRouter::show_help`. Dismisses itself by
/// asking the router to navigate back.
pub struct HelpWidget {
    text: String,
}

impl HelpWidget {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    #[allow(dead_code)]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl crate::widgets::Widget for HelpWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        let mut lines: Vec<Line> = self
            .text
            .lines()
            .map(|l| Line::from(l.to_string()))
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "q / Esc to dismiss",
            crate::theme::Theme::default().text_muted(),
        )));
        let p = Paragraph::new(lines)
            .block(panel_block("Help", focused))
            .wrap(Wrap { trim: false });
        f.render_widget(p, area);
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => vec![Effect::NavBack],
            _ => Vec::new(),
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
