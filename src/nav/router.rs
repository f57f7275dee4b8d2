use std::collections::HashMap;

use thiserror::Error;

use crate::widgets::help::HelpWidget;
use crate::widgets::Widget;

pub const HELP_PAGE: &str = "help";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavError {
    #[error("page '{0}' is not registered")]
    UnknownPage(String),
    #[error("navigation stack is empty")]
    EmptyStack,
}

pub struct PageEntry {
    pub widget: Box<dyn Widget>,
    #[allow(dead_code)]
    pub visible: bool,
}

/// Stack-based router over named pages. Forward navigation pushes the name
/// of the page being left onto the history stack, so `back` never revisits
/// the page it was called from.
#[derive(Default)]
pub struct PageRouter {
    pages: HashMap<String, PageEntry>,
    front: Option<String>,
    stack: Vec<String>,
}

impl PageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a page; idempotent by name.
    pub fn register(&mut self, name: impl Into<String>, widget: Box<dyn Widget>, visible: bool) {
        self.pages
            .insert(name.into(), PageEntry { widget, visible });
    }

    #[allow(dead_code)]
    pub fn is_registered(&self, name: &str) -> bool {
        self.pages.contains_key(name)
    }

    /// Forward navigation. Use only when the caller intends to come back;
    /// the current front page lands on the history stack.
    pub fn switch_to(&mut self, name: &str) -> Result<(), NavError> {
        if !self.pages.contains_key(name) {
            return Err(NavError::UnknownPage(name.to_string()));
        }
        if let Some(front) = self.front.take() {
            self.stack.push(front);
        }
        self.front = Some(name.to_string());
        Ok(())
    }

    /// Register + switch in one step, used for one-shot overlays.
    pub fn register_and_switch(&mut self, name: &str, widget: Box<dyn Widget>) {
        self.register(name, widget, false);
        // registration above makes the switch infallible
        let _ = self.switch_to(name);
    }

    /// Backward navigation; `false` (and no state change) on an empty
    /// stack.
    pub fn back(&mut self) -> bool {
        match self.stack.pop() {
            Some(name) => {
                self.front = Some(name);
                true
            }
            None => false,
        }
    }

    pub fn current_page_name(&self) -> Option<&str> {
        self.front.as_deref()
    }

    pub fn previous_page_name(&self) -> Result<&str, NavError> {
        self.stack
            .last()
            .map(String::as_str)
            .ok_or(NavError::EmptyStack)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn widget_mut(&mut self, name: &str) -> Option<&mut Box<dyn Widget>> {
        self.pages.get_mut(name).map(|e| &mut e.widget)
    }

    pub fn front_widget_mut(&mut self) -> Option<&mut Box<dyn Widget>> {
        let name = self.front.clone()?;
        self.widget_mut(&name)
    }

    /// Registers (overwriting) the singleton help overlay and fronts it.
    pub fn show_help(&mut self, message: &str) {
        self.register_and_switch(HELP_PAGE, Box::new(HelpWidget::new(message)));
    }
}
