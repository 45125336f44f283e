//! # Lifecycle event subscriber trait.
//!
//! Each subscriber gets its own worker task and bounded queue. A slow or
//! panicking subscriber only affects itself; overflow drops the event for that
//! subscriber and publishes `EventKind::SubscriberOverflow`.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use provisor::{Event, EventKind, Subscribe};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Subscribe for Audit {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::ProviderFailed) {
//!             // record the failure somewhere durable
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "audit" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of application lifecycle events.
///
/// Events arrive in FIFO order on a dedicated worker task, never in the
/// publisher's context. Panics are caught and published as `SubscriberPanicked`.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue. Clamped to at least 1.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
