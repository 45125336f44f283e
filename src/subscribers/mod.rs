//! # Lifecycle event subscribers.
//!
//! [`Subscribe`] is the extension point for plugging custom observers into the
//! application; [`SubscriberSet`] fans every lifecycle event out to them.
//!
//! ## Architecture
//! ```text
//! Bus ──► app listener ──► SubscriberSet::emit(&Event)
//!                              ├──► [queue 1] ──► worker 1 ──► sub1.on_event()
//!                              └──► [queue N] ──► worker N ──► subN.on_event()
//! ```
//!
//! Logging does not go through subscribers: the runtime logs with `tracing`
//! directly, so escalation messages are emitted even when the process exits
//! right after them.

mod set;
mod subscribe;

pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
