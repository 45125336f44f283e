//! # Supplier: one subscriber's view of a broker channel.
//!
//! A supplier owns the receiving half of its bounded queue. It detaches from
//! the broker when it is released explicitly, when the broker completes its
//! sequence and the consumer reads the end, or when it is dropped.

use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::broker::broker::Inner;
use crate::error::BrokerError;

/// Receiving end of a broker subscription.
///
/// Also usable as a [`Stream`] of items; the stream ends when the broker is
/// released or the supplier itself is released.
pub struct Supplier<T> {
    channel: String,
    id: u64,
    rx: mpsc::Receiver<T>,
    released: bool,
    broker: Weak<Inner<T>>,
}

impl<T> Supplier<T> {
    pub(crate) fn new(channel: String, id: u64, rx: mpsc::Receiver<T>, broker: Weak<Inner<T>>) -> Self {
        Self {
            channel,
            id,
            rx,
            released: false,
            broker,
        }
    }

    /// Channel this supplier is attached to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns true once the supplier has been released.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Waits for the next item.
    ///
    /// Returns `Ok(None)` when the sequence completed (the broker was released);
    /// the supplier releases itself at that point.
    pub async fn recv(&mut self) -> Result<Option<T>, BrokerError> {
        if self.released {
            return Err(BrokerError::AlreadyReleased { what: "supplier" });
        }
        match self.rx.recv().await {
            Some(item) => Ok(Some(item)),
            None => {
                self.release();
                Ok(None)
            }
        }
    }

    /// Stops receiving, discards buffered items and detaches from the broker.
    ///
    /// Idempotent. A publisher blocked on this supplier's queue is unblocked.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        self.rx.close();
        while self.rx.try_recv().is_ok() {}

        if let Some(inner) = self.broker.upgrade() {
            inner.detach(&self.channel, self.id);
        }
    }
}

impl<T> Unpin for Supplier<T> {}

impl<T> Drop for Supplier<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Stream for Supplier<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.released {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                this.release();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::broker::{Broker, BrokerConfig};
    use futures::StreamExt;

    #[tokio::test]
    async fn stream_ends_when_broker_releases() {
        let broker: Broker<u8> = Broker::new(BrokerConfig::default());
        let supplier = broker.subscribe("c").unwrap();

        let consumer = tokio::spawn(supplier.collect::<Vec<_>>());
        broker.publish(1, "c").await.unwrap();
        broker.publish(2, "c").await.unwrap();
        broker.release();

        assert_eq!(consumer.await.unwrap(), vec![1, 2]);
        assert_eq!(broker.drained().await, Ok(()));
    }

    #[tokio::test]
    async fn release_unblocks_a_waiting_publisher() {
        let broker: Broker<u8> = Broker::new(BrokerConfig::default());
        let mut supplier = broker.subscribe("c").unwrap();
        broker.publish(1, "c").await.unwrap();

        let publisher = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.publish(2, "c").await })
        };
        tokio::task::yield_now().await;

        supplier.release();
        assert!(supplier.is_released());
        assert_eq!(publisher.await.unwrap().unwrap(), 0);
        assert_eq!(broker.subscriber_count("c"), 0);
    }
}
