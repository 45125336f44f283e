//! # In-process channel broker.
//!
//! A [`Broker`] multiplexes items over named channels. Any number of
//! [`Supplier`]s can attach to a channel; each receives every item published
//! to that channel after it attached.
//!
//! ## Architecture
//! ```text
//! publish(item, "jobs")
//!     │   (sequential, in subscribe order, each send awaited)
//!     ├──► [bounded queue #1] ──► Supplier #1 .recv()
//!     ├──► [bounded queue #2] ──► Supplier #2 .recv()
//!     └──► [bounded queue #N] ──► Supplier #N .recv()
//!
//! release()
//!     ├──► complete every queue (suppliers see end-of-sequence)
//!     └──► drain: poll every `drain_interval`, at most `drain_attempts` times,
//!                 until every supplier detached ─► clear bookkeeping
//!                                         else ─► BrokerError::StuckSuppliers
//! ```
//!
//! ## Rules
//! - **Back-pressure**: a full supplier queue delays delivery to the suppliers
//!   after it and delays the publisher.
//! - **No buffering for latecomers**: publishing to a channel without suppliers
//!   returns `0`.
//! - **Weak bookkeeping**: the broker keeps only the sending half; the supplier
//!   is owned by whoever subscribed and detaches itself on release, exhaustion
//!   or drop.

mod broker;
mod config;
mod supplier;

use std::any::Any;
use std::sync::Arc;

pub use broker::Broker;
pub use config::{BrokerConfig, DEFAULT_CHANNEL};
pub use supplier::Supplier;

/// Type-erased item carried by the application's broker.
///
/// Consumers downcast with `item.downcast_ref::<MyEvent>()`.
pub type Message = Arc<dyn Any + Send + Sync>;
