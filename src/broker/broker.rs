//! # Broker: channel-keyed fan-out with back-pressure and a bounded release drain.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::broker::config::{BrokerConfig, DEFAULT_CHANNEL};
use crate::broker::supplier::Supplier;
use crate::error::BrokerError;
use crate::release::Release;

/// Bookkeeping entry of one attached supplier.
///
/// `tx` is `None` once the broker completed the supplier's sequence; the entry
/// itself stays until the supplier detaches.
struct Slot<T> {
    tx: Option<mpsc::Sender<T>>,
}

type Channels<T> = HashMap<String, BTreeMap<u64, Slot<T>>>;

pub(crate) struct Inner<T> {
    cfg: BrokerConfig,
    released: AtomicBool,
    next_id: AtomicU64,
    channels: Mutex<Channels<T>>,
    drained: watch::Sender<Option<Result<(), BrokerError>>>,
}

impl<T> Inner<T> {
    fn channels(&self) -> MutexGuard<'_, Channels<T>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes a supplier from the bookkeeping; drops the channel key once empty.
    pub(crate) fn detach(&self, channel: &str, id: u64) {
        let mut channels = self.channels();
        if let Some(set) = channels.get_mut(channel) {
            set.remove(&id);
            if set.is_empty() {
                channels.remove(channel);
            }
        }
    }

    fn attached(&self) -> usize {
        self.channels().values().map(BTreeMap::len).sum()
    }

    /// Polls until every supplier detached, then clears the bookkeeping.
    async fn drain(&self) -> Result<(), BrokerError> {
        let mut attempts: u32 = 0;
        loop {
            let remaining = self.attached();
            if remaining == 0 {
                self.channels().clear();
                debug!("broker drained");
                return Ok(());
            }
            if attempts >= self.cfg.drain_attempts {
                error!(remaining, attempts, "suppliers not released after broker release");
                return Err(BrokerError::StuckSuppliers {
                    remaining,
                    attempts,
                });
            }
            tokio::time::sleep(self.cfg.drain_interval).await;
            attempts += 1;
        }
    }
}

/// Cloneable handle to a channel broker.
///
/// ### Properties
/// - **Sequential fan-out**: `publish` awaits each supplier's queue in subscribe order.
/// - **Independent suppliers**: every supplier gets its own copy of each item.
/// - **Idempotent release**: see [`Broker::release`].
///
/// ## Example
/// ```rust
/// use provisor::{Broker, BrokerConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), provisor::BrokerError> {
/// let broker: Broker<u32> = Broker::new(BrokerConfig::default());
/// let mut jobs = broker.subscribe("jobs")?;
///
/// assert_eq!(broker.publish(7, "jobs").await?, 1);
/// assert_eq!(jobs.recv().await?, Some(7));
/// # Ok(())
/// # }
/// ```
pub struct Broker<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Broker<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Broker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("released", &self.inner.released.load(Ordering::Acquire))
            .field("suppliers", &self.inner.attached())
            .finish()
    }
}

impl<T> Default for Broker<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl<T> Broker<T>
where
    T: Clone + Send + 'static,
{
    /// Creates an empty broker.
    pub fn new(cfg: BrokerConfig) -> Self {
        let (drained, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                cfg,
                released: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
                channels: Mutex::new(HashMap::new()),
                drained,
            }),
        }
    }

    /// Attaches a new supplier to `channel`, creating the channel on first use.
    pub fn subscribe(&self, channel: &str) -> Result<Supplier<T>, BrokerError> {
        let (tx, rx) = mpsc::channel(self.inner.cfg.supplier_capacity_clamped());

        let mut channels = self.inner.channels();
        if self.inner.released.load(Ordering::Acquire) {
            return Err(BrokerError::AlreadyReleased { what: "broker" });
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        channels
            .entry(channel.to_string())
            .or_default()
            .insert(id, Slot { tx: Some(tx) });
        drop(channels);

        Ok(Supplier::new(
            channel.to_string(),
            id,
            rx,
            Arc::downgrade(&self.inner),
        ))
    }

    /// Attaches a new supplier to the [`DEFAULT_CHANNEL`].
    pub fn subscribe_default(&self) -> Result<Supplier<T>, BrokerError> {
        self.subscribe(DEFAULT_CHANNEL)
    }

    /// Delivers `item` to every supplier attached to `channel`.
    ///
    /// Suppliers are served one after another in subscribe order; each delivery
    /// is awaited before the next starts. Suppliers released meanwhile are
    /// skipped. Returns how many suppliers received the item.
    pub async fn publish(&self, item: T, channel: &str) -> Result<usize, BrokerError> {
        let targets: Vec<mpsc::Sender<T>> = {
            let channels = self.inner.channels();
            if self.inner.released.load(Ordering::Acquire) {
                return Err(BrokerError::AlreadyReleased { what: "broker" });
            }
            channels
                .get(channel)
                .map(|set| set.values().filter_map(|slot| slot.tx.clone()).collect())
                .unwrap_or_default()
        };

        let mut delivered = 0;
        for tx in targets {
            if tx.send(item.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Publishes to the [`DEFAULT_CHANNEL`].
    pub async fn publish_default(&self, item: T) -> Result<usize, BrokerError> {
        self.publish(item, DEFAULT_CHANNEL).await
    }

    /// Releases the broker.
    ///
    /// The first call marks the broker released, completes every supplier's
    /// sequence and starts the drain in the background; later calls do nothing.
    /// Returns `true` for the call that actually released.
    ///
    /// Outside a tokio runtime the drain runs a single check instead of polling.
    pub fn release(&self) -> bool {
        {
            let mut channels = self.inner.channels();
            if self.inner.released.swap(true, Ordering::AcqRel) {
                return false;
            }
            for slot in channels.values_mut().flat_map(BTreeMap::values_mut) {
                slot.tx = None;
            }
        }

        let inner = Arc::clone(&self.inner);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let outcome = inner.drain().await;
                    inner.drained.send_replace(Some(outcome));
                });
            }
            Err(_) => {
                warn!("broker released outside of a runtime; draining without waiting");
                let remaining = inner.attached();
                let outcome = if remaining == 0 {
                    inner.channels().clear();
                    Ok(())
                } else {
                    Err(BrokerError::StuckSuppliers {
                        remaining,
                        attempts: 0,
                    })
                };
                inner.drained.send_replace(Some(outcome));
            }
        }
        true
    }

    /// Waits for the release drain to finish and returns its outcome.
    ///
    /// Pending until [`Broker::release`] has been called.
    pub async fn drained(&self) -> Result<(), BrokerError> {
        let mut rx = self.inner.drained.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or(Ok(())),
            Err(_) => Ok(()),
        }
    }

    /// Returns true once [`Broker::release`] has been called.
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Returns the names of channels with at least one attached supplier, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.channels().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Returns how many suppliers are attached to `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .channels()
            .get(channel)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

impl<T> Release for Broker<T>
where
    T: Clone + Send + 'static,
{
    fn release(&self) {
        Broker::release(self);
    }

    fn is_released(&self) -> bool {
        Broker::is_released(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn broker() -> Broker<&'static str> {
        Broker::new(BrokerConfig::default())
    }

    #[tokio::test]
    async fn publish_reaches_every_supplier_of_the_channel() {
        let broker = broker();
        let mut a = broker.subscribe("c").unwrap();
        let mut b = broker.subscribe("c").unwrap();
        let mut other = broker.subscribe("other").unwrap();

        assert_eq!(broker.publish("x", "c").await.unwrap(), 2);
        assert_eq!(a.recv().await.unwrap(), Some("x"));
        assert_eq!(b.recv().await.unwrap(), Some("x"));

        let idle = tokio::time::timeout(Duration::from_millis(20), other.recv()).await;
        assert!(idle.is_err());
    }

    #[tokio::test]
    async fn publish_without_suppliers_returns_zero() {
        let broker = broker();
        assert_eq!(broker.publish("x", "nobody").await.unwrap(), 0);
        assert!(broker.channels().is_empty());
    }

    #[tokio::test]
    async fn default_channel_helpers() {
        let broker = broker();
        let mut s = broker.subscribe_default().unwrap();
        assert_eq!(s.channel(), DEFAULT_CHANNEL);
        assert_eq!(broker.publish_default("x").await.unwrap(), 1);
        assert_eq!(s.recv().await.unwrap(), Some("x"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_supplier_delays_later_suppliers_and_publisher() {
        let broker = broker();
        let mut first = broker.subscribe("c").unwrap();
        let mut second = broker.subscribe("c").unwrap();

        assert_eq!(broker.publish("one", "c").await.unwrap(), 2);

        let publisher = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.publish("two", "c").await })
        };

        // `first` is full, so "two" has not reached `second` yet.
        assert_eq!(second.recv().await.unwrap(), Some("one"));
        let pending = tokio::time::timeout(Duration::from_millis(50), second.recv()).await;
        assert!(pending.is_err());
        assert!(!publisher.is_finished());

        assert_eq!(first.recv().await.unwrap(), Some("one"));
        assert_eq!(publisher.await.unwrap().unwrap(), 2);
        assert_eq!(first.recv().await.unwrap(), Some("two"));
        assert_eq!(second.recv().await.unwrap(), Some("two"));
    }

    #[tokio::test]
    async fn released_supplier_is_skipped_and_forgotten() {
        let broker = broker();
        let mut kept = broker.subscribe("c").unwrap();
        let mut gone = broker.subscribe("c").unwrap();
        assert_eq!(broker.subscriber_count("c"), 2);

        gone.release();
        assert_eq!(broker.subscriber_count("c"), 1);

        assert_eq!(broker.publish("x", "c").await.unwrap(), 1);
        assert_eq!(kept.recv().await.unwrap(), Some("x"));
        assert_eq!(
            gone.recv().await,
            Err(BrokerError::AlreadyReleased { what: "supplier" })
        );
    }

    #[tokio::test]
    async fn last_supplier_detaching_removes_the_channel() {
        let broker = broker();
        let s = broker.subscribe("c").unwrap();
        assert_eq!(broker.channels(), vec!["c".to_string()]);
        drop(s);
        assert!(broker.channels().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn release_is_idempotent_and_drains_self_releasing_suppliers() {
        let broker = broker();
        let mut a = broker.subscribe("c").unwrap();
        let mut b = broker.subscribe("d").unwrap();

        assert!(broker.release());
        assert!(!broker.release());
        assert!(broker.is_released());

        assert_eq!(a.recv().await.unwrap(), None);
        assert!(a.is_released());
        assert_eq!(b.recv().await.unwrap(), None);

        assert_eq!(broker.drained().await, Ok(()));
        assert!(broker.channels().is_empty());
        assert_eq!(
            broker.publish("x", "c").await,
            Err(BrokerError::AlreadyReleased { what: "broker" })
        );
        assert!(broker.subscribe("c").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_supplier_fails_the_drain_after_bounded_attempts() {
        let broker = broker();
        let _stuck = broker.subscribe("c").unwrap();

        let started = tokio::time::Instant::now();
        broker.release();
        assert_eq!(
            broker.drained().await,
            Err(BrokerError::StuckSuppliers {
                remaining: 1,
                attempts: 5
            })
        );
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(6));
        assert_eq!(broker.subscriber_count("c"), 1);
    }
}
