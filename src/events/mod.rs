//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by the application, the
//! provider registry, provider run tasks and the shutdown watchdog.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Application`, `Registry`, provider run tasks, the watchdog,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the application's listener (updates `AliveTracker` and fans
//!   out to `SubscriberSet`).
//!
//! Events are observability only. The broker (`crate::broker`) is the
//! back-pressured channel system providers use to talk to each other.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
