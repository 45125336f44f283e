//! # Broker configuration.

use std::time::Duration;

/// Channel used when none is given.
pub const DEFAULT_CHANNEL: &str = "default";

/// Settings of a [`Broker`](crate::Broker).
///
/// ## Field semantics
/// - `drain_interval`: pause between release drain polls
/// - `drain_attempts`: polls after the first check before giving up (`0` = check once)
/// - `supplier_capacity`: per-supplier queue size (min 1; clamped)
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// Pause between polls while waiting for suppliers to detach after release.
    pub drain_interval: Duration,

    /// How many times the drain waits `drain_interval` before reporting stuck suppliers.
    pub drain_attempts: u32,

    /// Items buffered per supplier before `publish` waits for that supplier.
    pub supplier_capacity: usize,
}

impl BrokerConfig {
    /// Returns the supplier queue size clamped to a minimum of 1.
    #[inline]
    pub fn supplier_capacity_clamped(&self) -> usize {
        self.supplier_capacity.max(1)
    }
}

impl Default for BrokerConfig {
    /// Default configuration:
    ///
    /// - `drain_interval = 1s`
    /// - `drain_attempts = 5` (about 5s before stuck suppliers are fatal)
    /// - `supplier_capacity = 1` (publisher waits as soon as a supplier falls one item behind)
    fn default() -> Self {
        Self {
            drain_interval: Duration::from_secs(1),
            drain_attempts: 5,
            supplier_capacity: 1,
        }
    }
}
