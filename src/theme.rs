use ratatui::style::{Color, Modifier, Style};

use crate::model::HealthStatus;

#[derive(Clone, Debug)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub accent: Color,
    pub frame: Color,
    pub selected: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub muted: Color,
}

impl Theme {
    pub fn fleet_dark() -> Self {
        Self {
            bg: Color::Rgb(22, 24, 28),
            fg: Color::White,
            accent: Color::Rgb(64, 160, 255),
            frame: Color::Rgb(90, 90, 100),
            selected: Color::Rgb(255, 150, 0),
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            muted: Color::DarkGray,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::fleet_dark()
    }
}

// Style helpers that use the theme
impl Theme {
    pub fn border_focused(&self) -> Style {
        Style::default().fg(self.selected)
    }

    pub fn border_unfocused(&self) -> Style {
        Style::default().fg(self.frame)
    }

    pub fn text_accent_bold(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn text_error(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn list_cursor_style(&self) -> Style {
        Style::default()
            .fg(self.bg)
            .bg(self.selected)
            .add_modifier(Modifier::BOLD)
    }

    pub fn health_color(&self, status: HealthStatus) -> Color {
        match status {
            HealthStatus::Ok => self.success,
            HealthStatus::Initializing => self.warning,
            HealthStatus::Impaired => self.error,
            HealthStatus::Unknown => self.muted,
        }
    }
}
