#![forbid(unsafe_code)]

//! Runtime-wide theme selection.
//!
//! Styling itself is out of scope; the runtime only tracks which named
//! theme is active so that connected elements re-render with
//! [`ChangeType::THEME`](elementa_core::ChangeType::THEME) on a switch.

use crate::reactive::{Observable, Subscription};

/// Name of the theme active when nothing else was chosen.
pub const DEFAULT_THEME: &str = "light";

/// Observable theme name shared by a runtime.
#[derive(Clone, Debug)]
pub struct ThemeContext {
    current: Observable<String>,
}

impl ThemeContext {
    /// A context starting at `theme`.
    #[must_use]
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            current: Observable::new(theme.into()),
        }
    }

    /// The active theme name.
    #[must_use]
    pub fn current(&self) -> String {
        self.current.get()
    }

    /// Switch theme. Returns whether the name changed.
    pub fn set_theme(&self, theme: impl Into<String>) -> bool {
        let changed = self.current.set(theme.into());
        if changed {
            tracing::debug!(theme = %self.current(), "theme changed");
        }
        changed
    }

    /// Subscribe to theme switches.
    pub fn subscribe(&self, callback: impl Fn(&String) + 'static) -> Subscription {
        self.current.subscribe(callback)
    }

    /// Incremented on every switch.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.version()
    }
}

impl Default for ThemeContext {
    fn default() -> Self {
        Self::new(DEFAULT_THEME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn switching_to_the_same_theme_is_silent() {
        let ctx = ThemeContext::default();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let _sub = ctx.subscribe(move |_| counter.set(counter.get() + 1));

        assert!(!ctx.set_theme(DEFAULT_THEME));
        assert!(ctx.set_theme("dark"));
        assert_eq!(ctx.current(), "dark");
        assert_eq!(hits.get(), 1);
        assert_eq!(ctx.version(), 1);
    }
}
