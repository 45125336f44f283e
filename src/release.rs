//! # Release contract shared by long-lived handles.
//!
//! Both the [`Application`](crate::Application) and the [`Broker`](crate::Broker)
//! hold resources that must be let go exactly once. Calling
//! [`Release::release`] again is a no-op.

/// Idempotent resource release.
pub trait Release {
    /// Releases the resource. Subsequent calls do nothing.
    fn release(&self);

    /// Returns true once the resource has been released.
    fn is_released(&self) -> bool;
}
