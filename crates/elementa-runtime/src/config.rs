#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! [`RuntimeConfig`] is plain data. It can be built in code, read from the
//! environment with [`RuntimeConfig::from_env`], or (with the
//! `policy-config` feature) loaded from a TOML file.
//!
//! | Field | Env var | Default |
//! |-------|---------|---------|
//! | `structural_watching` | `ELEMENTA_STRUCTURAL_WATCHING` | `true` |
//! | `max_flush_turns` | `ELEMENTA_MAX_FLUSH_TURNS` | `64` |
//!
//! # Failure Modes
//!
//! - Unparsable environment values are ignored with a warning; the default
//!   stays in effect.
//! - TOML loading reports I/O and parse errors as [`ConfigLoadError`].

use std::env;
use std::fmt;

/// Default bound on task-queue turns drained by a single flush.
pub const DEFAULT_MAX_FLUSH_TURNS: usize = 64;

const ENV_STRUCTURAL_WATCHING: &str = "ELEMENTA_STRUCTURAL_WATCHING";
const ENV_MAX_FLUSH_TURNS: &str = "ELEMENTA_MAX_FLUSH_TURNS";

/// Tunables for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(serde::Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default, deny_unknown_fields))]
pub struct RuntimeConfig {
    /// Wrap complex property values in watched handles. When `false`,
    /// values are stored unwrapped and only whole-value replacement is
    /// detected.
    pub structural_watching: bool,
    /// Upper bound on task-queue turns per [`Runtime::flush`](crate::Runtime::flush).
    /// A render that keeps scheduling renders stops here.
    pub max_flush_turns: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            structural_watching: true,
            max_flush_turns: DEFAULT_MAX_FLUSH_TURNS,
        }
    }
}

impl RuntimeConfig {
    /// Set [`RuntimeConfig::structural_watching`].
    #[must_use]
    pub const fn with_structural_watching(mut self, enabled: bool) -> Self {
        self.structural_watching = enabled;
        self
    }

    /// Set [`RuntimeConfig::max_flush_turns`]. Zero is raised to one.
    #[must_use]
    pub const fn with_max_flush_turns(mut self, turns: usize) -> Self {
        self.max_flush_turns = if turns == 0 { 1 } else { turns };
        self
    }

    /// Defaults overridden by `ELEMENTA_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_STRUCTURAL_WATCHING) {
            match parse_flag(&raw) {
                Some(flag) => config.structural_watching = flag,
                None => tracing::warn!(var = ENV_STRUCTURAL_WATCHING, value = %raw, "ignoring unparsable flag"),
            }
        }
        if let Some(raw) = lookup(ENV_MAX_FLUSH_TURNS) {
            match raw.trim().parse::<usize>() {
                Ok(turns) => config = config.with_max_flush_turns(turns),
                Err(_) => tracing::warn!(var = ENV_MAX_FLUSH_TURNS, value = %raw, "ignoring unparsable count"),
            }
        }
        config
    }

    /// Parse a TOML document. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::Parse`] for invalid TOML or unknown fields.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigLoadError::Parse(e.to_string()))?;
        Ok(config.with_max_flush_turns(config.max_flush_turns))
    }

    /// Load a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::Io`] if the file cannot be read, or
    /// [`ConfigLoadError::Parse`] if it is not a valid configuration.
    #[cfg(feature = "policy-config")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Errors from loading a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLoadError {
    /// The file could not be read.
    Io {
        /// Path as given.
        path: String,
        /// Underlying error text.
        message: String,
    },
    /// The document is not a valid configuration.
    Parse(String),
}

impl fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "cannot read config {path}: {message}"),
            Self::Parse(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigLoadError {}
