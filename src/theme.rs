//! Process-wide theme state.
//!
//! DESIGN
//! ======
//! The theme is explicit configuration held in one subscribable store.
//! Renderers read the current value or await changes on a watch receiver;
//! nothing polls document attributes. `ThemeStore::global()` is the single
//! process-wide instance; tests and embedders may build their own.

#[cfg(test)]
#[path = "theme_test.rs"]
mod theme_test;

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Parse a stored preference. Anything other than `"dark"` is light.
    #[must_use]
    pub fn from_preference(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("dark") { Self::Dark } else { Self::Light }
    }
}

/// Subscribable holder for the current [`Theme`].
#[derive(Debug)]
pub struct ThemeStore {
    tx: watch::Sender<Theme>,
}

impl ThemeStore {
    #[must_use]
    pub fn new(initial: Theme) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// The process-wide store, initialised to [`Theme::Light`] on first use.
    pub fn global() -> &'static ThemeStore {
        static GLOBAL: OnceLock<ThemeStore> = OnceLock::new();
        GLOBAL.get_or_init(|| ThemeStore::new(Theme::default()))
    }

    #[must_use]
    pub fn current(&self) -> Theme {
        *self.tx.borrow()
    }

    /// Set the theme. Subscribers are only woken when the value changes.
    pub fn set(&self, theme: Theme) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == theme {
                return false;
            }
            *current = theme;
            true
        });
        if changed {
            debug!(?theme, "theme changed");
        }
    }

    /// Flip between light and dark, returning the new theme.
    pub fn toggle(&self) -> Theme {
        let next = self.current().toggled();
        self.set(next);
        next
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.tx.subscribe()
    }
}

impl Default for ThemeStore {
    fn default() -> Self {
        Self::new(Theme::default())
    }
}
