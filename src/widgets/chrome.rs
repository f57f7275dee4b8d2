use crate::theme::Theme;
use ratatui::widgets::{Block, Borders};

pub fn panel_block<'a>(title: &'a str, focused: bool) -> Block<'a> {
    panel_block_themed(title, focused, &Theme::default())
}

pub fn panel_block_themed<'a>(title: &'a str, focused: bool, theme: &Theme) -> Block<'a> {
    let style = if focused {
        theme.border_focused()
    } else {
        theme.border_unfocused()
    };
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(style)
}
