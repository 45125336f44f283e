//! # Lifecycle events emitted by the application, registry and watchdog.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Application events**: init / reset / run transitions
//! - **Provider events**: registration, load/unload, run outcome
//! - **Shutdown events**: request and watchdog escalation stages
//! - **Subscriber events**: overflow and panics of user subscribers
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! provider id, reasons, exit codes and elapsed shutdown time.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use provisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ProviderFailed)
//!     .with_provider("db")
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::ProviderFailed);
//! assert_eq!(ev.provider.as_deref(), Some("db"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `provider` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `provider` (subscriber name), `reason`.
    SubscriberOverflow,

    // === Application events ===
    /// `init()` completed.
    AppInitialized,

    /// `reset()` tore the application down and is about to re-initialize.
    AppReset,

    /// `run()` started every loaded provider.
    AppRunning,

    /// `run()` found no loaded providers.
    NoProviders,

    /// A failure reached the global error handler.
    ///
    /// Sets: `provider` (source, if known), `reason`, `code` (exit code if recognized).
    UnhandledError,

    // === Provider events ===
    /// Identifier registered.
    ProviderRegistered,

    /// Provider instantiated and its `load` hook completed.
    ProviderLoaded,

    /// Provider `unload` hook completed and the instance was dropped.
    ProviderUnloaded,

    /// Provider `run` started.
    ProviderStarting,

    /// Provider `run` returned successfully or after observing cancellation.
    ProviderStopped,

    /// Provider `run` returned an error or panicked.
    ///
    /// Sets: `provider`, `reason`.
    ProviderFailed,

    // === Shutdown events ===
    /// `shutdown(code)` was called.
    ///
    /// Sets: `code`.
    ShutdownRequested,

    /// Watchdog stage 0 → 1: shutdown is blocked beyond the hooked timeout.
    ///
    /// Sets: `code`, `elapsed_ms`, `reason` (stuck providers).
    ShutdownStalled,

    /// Watchdog stage 1 → 2: the application will be force-terminated.
    ///
    /// Sets: `code`, `elapsed_ms`.
    ShutdownForcing,

    /// No outstanding work remained; the application terminated normally.
    ///
    /// Sets: `code`, `elapsed_ms`.
    ShutdownClosed,

    /// The watchdog terminated the application bypassing graceful drain.
    ///
    /// Sets: `code`, `elapsed_ms`.
    ShutdownForced,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Provider identifier (or subscriber name for subscriber events).
    pub provider: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Exit code, for shutdown and error events.
    pub code: Option<i32>,
    /// Time since shutdown started, in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            provider: None,
            reason: None,
            code: None,
            elapsed_ms: None,
        }
    }

    /// Attaches a provider identifier.
    #[inline]
    pub fn with_provider(mut self, id: impl Into<Arc<str>>) -> Self {
        self.provider = Some(id.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Attaches the elapsed shutdown time (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.elapsed_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_provider(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_provider(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
