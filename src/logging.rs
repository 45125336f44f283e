//! # Log output setup.
//!
//! Installs a `tracing-subscriber` formatter filtered by, in order of
//! precedence, the `DEBUG_LEVEL` variable, `RUST_LOG`, then the given default.

use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log filter.
pub const DEBUG_LEVEL_VAR: &str = "DEBUG_LEVEL";

/// Installs the global log subscriber.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(default: &str) -> bool {
    let filter = std::env::var(DEBUG_LEVEL_VAR)
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
