//! # Provider liveness tracker with sequence-based ordering.
//!
//! Keeps track of which providers are inside `run`, so the shutdown watchdog
//! can name the ones blocking termination.
//!
//! ```text
//! Application ──► Bus ──► listener ──► AliveTracker::update()
//!                                              │
//!                                              ▼
//!                                HashMap<provider id, {seq, alive}>
//! ```
//!
//! ## Rules
//! - Only `ProviderStarting` / `ProviderStopped` / `ProviderFailed` change alive state
//! - `ProviderUnloaded` forgets the provider
//! - Events with `seq <= last_seq` are rejected (stale)
//! - Reads are eventually consistent with the bus

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::events::{Event, EventKind};

#[derive(Debug, Clone, Copy)]
struct ProviderState {
    last_seq: u64,
    alive: bool,
}

/// Thread-safe tracker of running providers.
#[derive(Default)]
pub(crate) struct AliveTracker {
    state: RwLock<HashMap<String, ProviderState>>,
}

impl AliveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `ev` if it is newer than the last event seen for its provider.
    ///
    /// Returns true if alive state changed.
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(id) = ev.provider.as_deref() else {
            return false;
        };
        let alive = match ev.kind {
            EventKind::ProviderStarting => true,
            EventKind::ProviderStopped | EventKind::ProviderFailed => false,
            EventKind::ProviderUnloaded => {
                self.state.write().await.remove(id);
                return false;
            }
            _ => return false,
        };

        let mut state = self.state.write().await;
        let entry = state.entry(id.to_string()).or_insert(ProviderState {
            last_seq: 0,
            alive: false,
        });
        if ev.seq <= entry.last_seq {
            return false;
        }
        entry.last_seq = ev.seq;
        let changed = entry.alive != alive;
        entry.alive = alive;
        changed
    }

    /// Sorted identifiers of providers currently inside `run`.
    pub async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut alive: Vec<String> = state
            .iter()
            .filter(|(_, st)| st.alive)
            .map(|(id, _)| id.clone())
            .collect();
        alive.sort_unstable();
        alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_events_are_rejected() {
        let tracker = AliveTracker::new();
        let start = Event::new(EventKind::ProviderStarting).with_provider("db");
        let stop = Event::new(EventKind::ProviderStopped).with_provider("db");

        assert!(!tracker.update(&stop).await);
        assert!(!tracker.update(&start).await);
        assert!(tracker.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn snapshot_lists_running_providers_sorted() {
        let tracker = AliveTracker::new();
        for id in ["web", "db", "cache"] {
            tracker
                .update(&Event::new(EventKind::ProviderStarting).with_provider(id))
                .await;
        }
        tracker
            .update(&Event::new(EventKind::ProviderFailed).with_provider("cache"))
            .await;
        tracker
            .update(&Event::new(EventKind::ProviderUnloaded).with_provider("web"))
            .await;

        assert_eq!(tracker.snapshot().await, vec!["db".to_string()]);
    }
}
