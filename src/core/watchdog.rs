//! # Shutdown watchdog.
//!
//! Started by `shutdown(code)`. Polls the application's outstanding work every
//! tick and escalates while it does not drain:
//!
//! ```text
//! stage 0 ── elapsed > hooked_timeout ──────► stage 1  (warn, name stuck providers)
//! stage 1 ── elapsed > hooked_timeout_max ──► stage 2  (warn, termination pending)
//! stage 2 ── next tick ─────────────────────► Forced   (code, or -1 if code was 0)
//!
//! any stage ── no outstanding work ──► Closed (code)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::core::alive::AliveTracker;
use crate::events::{Bus, Event, EventKind};

/// How the watchdog ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// All outstanding work drained.
    Closed { code: i32 },
    /// Termination was forced.
    Forced { code: i32 },
}

impl Outcome {
    pub fn code(self) -> i32 {
        match self {
            Outcome::Closed { code } | Outcome::Forced { code } => code,
        }
    }
}

pub(crate) struct Watchdog {
    pub tracker: TaskTracker,
    pub alive: Arc<AliveTracker>,
    pub bus: Bus,
    pub tick: Duration,
    pub hooked_timeout: Duration,
    pub hooked_timeout_max: Duration,
}

impl Watchdog {
    pub async fn watch(self, code: i32) -> Outcome {
        let started = Instant::now();
        let mut stage = 0u8;

        loop {
            let elapsed = started.elapsed();

            if self.tracker.is_empty() {
                if stage > 0 {
                    warn!(code, elapsed_ms = elapsed.as_millis() as u64, "application closed after stalling");
                } else {
                    info!(code, "application closed");
                }
                self.bus.publish(
                    Event::new(EventKind::ShutdownClosed)
                        .with_code(code)
                        .with_elapsed(elapsed),
                );
                return Outcome::Closed { code };
            }

            match stage {
                0 if elapsed > self.hooked_timeout => {
                    let window = self.hooked_timeout_max.saturating_sub(self.hooked_timeout);
                    let stuck = self.alive.snapshot().await;
                    warn!(
                        pending = self.tracker.len(),
                        ?stuck,
                        "something is blocking shutdown; application will be terminated in {}s",
                        window.as_secs()
                    );
                    self.bus.publish(
                        Event::new(EventKind::ShutdownStalled)
                            .with_code(code)
                            .with_elapsed(elapsed)
                            .with_reason(stuck.join(",")),
                    );
                    stage = 1;
                }
                1 if elapsed > self.hooked_timeout_max => {
                    warn!(pending = self.tracker.len(), "application termination pending");
                    self.bus.publish(
                        Event::new(EventKind::ShutdownForcing)
                            .with_code(code)
                            .with_elapsed(elapsed),
                    );
                    stage = 2;
                }
                2 => {
                    let forced = if code == 0 { -1 } else { code };
                    error!(code = forced, pending = self.tracker.len(), "application terminated forcefully");
                    self.bus.publish(
                        Event::new(EventKind::ShutdownForced)
                            .with_code(forced)
                            .with_elapsed(elapsed),
                    );
                    return Outcome::Forced { code: forced };
                }
                _ => {}
            }

            tokio::time::sleep(self.tick).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watchdog(tracker: TaskTracker) -> Watchdog {
        Watchdog {
            tracker,
            alive: Arc::new(AliveTracker::new()),
            bus: Bus::new(16),
            tick: Duration::from_millis(100),
            hooked_timeout: Duration::from_secs(3),
            hooked_timeout_max: Duration::from_secs(13),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn closes_immediately_without_outstanding_work() {
        let started = Instant::now();
        let outcome = watchdog(TaskTracker::new()).watch(4).await;
        assert_eq!(outcome, Outcome::Closed { code: 4 });
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn closes_once_work_drains() {
        let tracker = TaskTracker::new();
        tracker.spawn(tokio::time::sleep(Duration::from_secs(5)));

        let mut rx = {
            let wd = watchdog(tracker.clone());
            let rx = wd.bus.subscribe();
            assert_eq!(wd.watch(0).await, Outcome::Closed { code: 0 });
            rx
        };

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(kinds, vec![EventKind::ShutdownStalled, EventKind::ShutdownClosed]);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_work_is_forced_after_max_timeout() {
        let tracker = TaskTracker::new();
        tracker.spawn(std::future::pending::<()>());

        let wd = watchdog(tracker.clone());
        let mut rx = wd.bus.subscribe();
        let started = Instant::now();
        assert_eq!(wd.watch(0).await, Outcome::Forced { code: -1 });
        assert!(started.elapsed() > Duration::from_secs(13));
        assert!(started.elapsed() < Duration::from_secs(14));

        let mut escalation = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            escalation.push((ev.kind, ev.elapsed_ms.unwrap_or_default(), ev.code));
        }
        let kinds: Vec<EventKind> = escalation.iter().map(|(kind, _, _)| *kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::ShutdownStalled, EventKind::ShutdownForcing, EventKind::ShutdownForced]
        );

        let (_, stalled_ms, _) = escalation[0];
        assert!(stalled_ms > 3_000 && stalled_ms <= 3_200, "stalled at {stalled_ms}ms");
        let (_, forcing_ms, _) = escalation[1];
        assert!(forcing_ms > 13_000 && forcing_ms <= 13_200, "forcing at {forcing_ms}ms");
        let (_, forced_ms, forced_code) = escalation[2];
        assert!(forced_ms > forcing_ms && forced_ms <= 13_300, "forced at {forced_ms}ms");
        assert_eq!(forced_code, Some(-1));

        assert_eq!(watchdog(tracker).watch(7).await.code(), 7);
    }
}
