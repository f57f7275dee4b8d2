use crossterm::event::KeyCode;

/// Abstract navigation inputs; concrete key bindings live only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavInput {
    Next,
    Previous,
    Confirm,
    Dismiss,
    Help,
}

pub fn nav_input(code: KeyCode) -> Option<NavInput> {
    match code {
        KeyCode::Tab => Some(NavInput::Next),
        KeyCode::BackTab => Some(NavInput::Previous),
        KeyCode::Enter => Some(NavInput::Confirm),
        KeyCode::Esc | KeyCode::Backspace => Some(NavInput::Dismiss),
        KeyCode::Char('?') => Some(NavInput::Help),
        _ => None,
    }
}
