//! # Application configuration.
//!
//! [`AppConfig`] centralizes identity, shutdown timing and discovery settings
//! for an [`Application`](crate::Application).
//!
//! ## Shutdown timeline
//! ```text
//! shutdown(code)
//!   0s ──────────── hooked_timeout (3s) ─────────── hooked_timeout_max (13s) ── +1 tick
//!   │  closed?         warn: "blocking shutdown"      warn: "terminate pending"   force exit
//!   └── polled every watchdog_tick (100ms)
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::broker::BrokerConfig;

/// Configuration of an application instance.
///
/// ## Field semantics
/// - `hooked_timeout`: time after which a stalled shutdown is reported
/// - `hooked_timeout_max`: time after which the process is force-terminated (must be >= `hooked_timeout`)
/// - `watchdog_tick`: poll period of the shutdown watchdog (min 1ms; clamped)
/// - `bus_capacity`: lifecycle event ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Application name, used in logs.
    pub name: String,

    /// Application root directory; environment files are read from here.
    pub directory: PathBuf,

    /// Shutdown duration after which the watchdog warns that something is blocking.
    pub hooked_timeout: Duration,

    /// Shutdown duration after which the watchdog force-terminates.
    pub hooked_timeout_max: Duration,

    /// Watchdog poll period.
    pub watchdog_tick: Duration,

    /// Capacity of the lifecycle event bus.
    pub bus_capacity: usize,

    /// Register every catalog entry during `init()`.
    pub locate_declared: bool,

    /// Namespace scanned (recursively) for providers during `init()`.
    pub provider_namespace: String,

    /// Extra namespaces scanned after `provider_namespace`.
    pub provider_namespaces: Vec<String>,

    /// Listen for SIGINT/SIGTERM/SIGQUIT while running and shut down with code 0.
    pub handle_signals: bool,

    /// Settings of the application's channel broker.
    pub broker: BrokerConfig,
}

impl AppConfig {
    /// Creates the default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Time between the stall warning and forced termination.
    #[inline]
    pub fn grace_window(&self) -> Duration {
        self.hooked_timeout_max.saturating_sub(self.hooked_timeout)
    }

    /// Returns the watchdog tick clamped to a minimum of 1ms.
    #[inline]
    pub fn watchdog_tick_clamped(&self) -> Duration {
        self.watchdog_tick.max(Duration::from_millis(1))
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Every namespace scanned during `init()`, primary first, empty entries skipped.
    pub fn namespaces(&self) -> Vec<&str> {
        std::iter::once(self.provider_namespace.as_str())
            .chain(self.provider_namespaces.iter().map(String::as_str))
            .filter(|ns| !ns.is_empty())
            .collect()
    }
}

impl Default for AppConfig {
    /// Default configuration:
    ///
    /// - `name = "app"`, `directory = "."`
    /// - `hooked_timeout = 3s`, `hooked_timeout_max = 13s`, `watchdog_tick = 100ms`
    /// - `bus_capacity = 1024`
    /// - `locate_declared = true`, `provider_namespace = "providers"`
    /// - `handle_signals = true`
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            directory: PathBuf::from("."),
            hooked_timeout: Duration::from_secs(3),
            hooked_timeout_max: Duration::from_secs(13),
            watchdog_tick: Duration::from_millis(100),
            bus_capacity: 1024,
            locate_declared: true,
            provider_namespace: "providers".to_string(),
            provider_namespaces: Vec::new(),
            handle_signals: true,
            broker: BrokerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_shutdown_timeline() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.grace_window(), Duration::from_secs(10));
        assert_eq!(cfg.watchdog_tick_clamped(), Duration::from_millis(100));
    }

    #[test]
    fn namespaces_skip_empty_entries() {
        let mut cfg = AppConfig::named("svc");
        cfg.provider_namespaces = vec![String::new(), "plugins".into()];
        assert_eq!(cfg.namespaces(), vec!["providers", "plugins"]);

        cfg.provider_namespace.clear();
        assert_eq!(cfg.namespaces(), vec!["plugins"]);
    }
}
