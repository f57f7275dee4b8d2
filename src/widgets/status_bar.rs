use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::ui::AppState;

// UI tick is 200ms
pub const TICKS_PER_SECOND: u64 = 5;

/// Single-line transient message. Clearing is driven by the UI tick
/// counter: `set_text` arms a deadline, `on_tick` clears once it passes.
/// A newer `set_text` replaces the deadline wholesale, so a stale clear
/// can never race a fresh message, and no caller ever blocks.
pub struct StatusBar {
    text: Option<String>,
    expires_at_tick: u64,
    ttl_ticks: u64,
}

impl StatusBar {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            text: None,
            expires_at_tick: 0,
            ttl_ticks: ttl_secs.saturating_mul(TICKS_PER_SECOND),
        }
    }

    pub fn set_text(&mut self, msg: impl Into<String>, now_tick: u64) {
        self.text = Some(msg.into());
        self.expires_at_tick = now_tick.saturating_add(self.ttl_ticks);
    }

    pub fn on_tick(&mut self, tick: u64) {
        if self.text.is_some() && tick >= self.expires_at_tick {
            self.text = None;
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl crate::widgets::Widget for StatusBar {
    fn render(&mut self, f: &mut Frame, area: Rect, _focused: bool, _tick: u64) {
        let theme = crate::theme::Theme::default();
        let line = match &self.text {
            Some(msg) => Line::from(Span::styled(format!(" {msg}"), theme.text_accent_bold())),
            None => Line::from(""),
        };
        f.render_widget(Paragraph::new(line), area);
    }

    // Never takes input focus
    fn focusable(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

pub fn draw_status(f: &mut Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;
    let mut spans: Vec<Span> = Vec::new();
    if let Some(msg) = state.status.text() {
        spans.push(Span::styled(
            format!(" {msg}"),
            theme.text_accent_bold(),
        ));
        spans.push(Span::raw("  |  "));
    }
    let page = state.router.current_page_name().unwrap_or("-");
    spans.push(Span::styled(
        format!("page: {page}"),
        Style::default().fg(Color::Magenta),
    ));
    if state.router.depth() > 0 {
        if let Ok(prev) = state.router.previous_page_name() {
            spans.push(Span::styled(
                format!(" (back: {prev})"),
                theme.text_muted(),
            ));
        }
    }
    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        "Tab focus  •  Enter detail  •  ? help  •  q quit",
        theme.text_muted(),
    ));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
