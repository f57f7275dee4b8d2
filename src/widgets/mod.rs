pub mod chrome;
pub mod detail;
pub mod grid;
pub mod help;
pub mod instances;
pub mod radio;
pub mod status_bar;

use crate::app::Effect;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use std::any::Any;

/// Capability interface for every drawable, focusable unit. Widgets that
/// must never take focus override `focusable`.
pub trait Widget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64);
    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        let _ = key;
        Vec::new()
    }
    fn focusable(&self) -> bool {
        true
    }
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
