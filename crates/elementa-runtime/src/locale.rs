#![forbid(unsafe_code)]

//! Runtime-wide locale.
//!
//! [`LocaleContext`] owns the active locale tag. Every connected element
//! subscribes to it and re-renders with [`ChangeType::LANG`] when it
//! changes.
//!
//! Tags are normalized: the encoding (`.UTF-8`) and modifier (`@euro`)
//! suffixes are dropped, `_` becomes `-`, and `C` / `POSIX` map to `en`.
//!
//! [`ChangeType::LANG`]: elementa_core::ChangeType::LANG

use std::env;

use crate::reactive::{Observable, Subscription};

/// A BCP-47-style locale tag such as `"en"` or `"fr-FR"`.
pub type Locale = String;

const FALLBACK: &str = "en";

/// Observable locale shared by a runtime.
#[derive(Clone, Debug)]
pub struct LocaleContext {
    current: Observable<Locale>,
}

impl LocaleContext {
    /// A context starting at `locale`.
    #[must_use]
    pub fn new(locale: impl Into<Locale>) -> Self {
        Self {
            current: Observable::new(normalize_locale(&locale.into())),
        }
    }

    /// A context starting at the system locale.
    #[must_use]
    pub fn system() -> Self {
        Self::new(detect_system_locale())
    }

    /// The active locale.
    #[must_use]
    pub fn current_locale(&self) -> Locale {
        self.current.get()
    }

    /// Switch locale. Returns whether the normalized tag changed.
    pub fn set_locale(&self, locale: impl Into<Locale>) -> bool {
        let locale = normalize_locale(&locale.into());
        let changed = self.current.set(locale);
        if changed {
            tracing::debug!(locale = %self.current_locale(), "locale changed");
        }
        changed
    }

    /// Subscribe to locale changes.
    pub fn subscribe(&self, callback: impl Fn(&Locale) + 'static) -> Subscription {
        self.current.subscribe(callback)
    }

    /// Incremented on every change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.version()
    }
}

impl Default for LocaleContext {
    fn default() -> Self {
        Self::new(FALLBACK)
    }
}

/// Detect the system locale: `LC_ALL`, then `LANG`, then `"en"`.
#[must_use]
pub fn detect_system_locale() -> Locale {
    let lc_all = env::var("LC_ALL").ok();
    let lang = env::var("LANG").ok();
    detect_from(lc_all.as_deref(), lang.as_deref())
}

fn detect_from(lc_all: Option<&str>, lang: Option<&str>) -> Locale {
    lc_all
        .and_then(normalize_raw)
        .or_else(|| lang.and_then(normalize_raw))
        .unwrap_or_else(|| FALLBACK.to_owned())
}

fn normalize_locale(raw: &str) -> Locale {
    normalize_raw(raw).unwrap_or_else(|| FALLBACK.to_owned())
}

fn normalize_raw(raw: &str) -> Option<Locale> {
    let tag = raw.trim().split(['@', '.']).next()?.trim();
    if tag.is_empty() {
        return None;
    }
    if tag.eq_ignore_ascii_case("c") || tag.eq_ignore_ascii_case("posix") {
        return Some(FALLBACK.to_owned());
    }
    Some(tag.replace('_', "-"))
}
