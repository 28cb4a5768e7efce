#![forbid(unsafe_code)]

//! Opt-in log output.
//!
//! The runtime only emits `tracing` events; installing a subscriber is the
//! application's call. [`init`] is a convenience for binaries and demos
//! that just want formatted output filtered by `ELEMENTA_LOG`
//! (`EnvFilter` syntax, default `warn`).

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "ELEMENTA_LOG";

/// Filter used when [`LOG_ENV`] is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

/// Install a global `fmt` subscriber. Returns `false` if one was already
/// installed.
#[cfg(feature = "log-init")]
pub fn init() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
