//! Subscription channels handed out to live subscribers.
//!
//! A `Subscription` is the consuming end of one broker registration. It is an
//! infinite in-order event stream that ends only when cancelled; restarting
//! means opening a new subscription, which never replays history.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use kennel_core::Topic;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::Stream;

use crate::broker::{Broker, SubscriptionId};

#[derive(Default)]
struct ChannelStats {
    opened: AtomicU64,
    closed: AtomicU64,
}

/// Diagnostic view of channel lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelSnapshot {
    pub active: u64,
    pub total_opened: u64,
    pub total_closed: u64,
}

/// Opens, tracks and tears down subscriber channels on a broker.
pub struct SubscriptionManager<E> {
    broker: Arc<Broker<E>>,
    stats: Arc<ChannelStats>,
}

impl<E: Clone + Send + 'static> SubscriptionManager<E> {
    pub fn new(broker: Arc<Broker<E>>) -> Self {
        Self {
            broker,
            stats: Arc::new(ChannelStats::default()),
        }
    }

    /// Register a new channel on `topic`.
    pub fn open(&self, topic: &Topic) -> Subscription<E> {
        let (id, receiver) = self.broker.subscribe(topic);
        self.stats.opened.fetch_add(1, Ordering::Relaxed);
        tracing::info!(topic = %topic, subscription_id = %id, "subscription opened");
        Subscription {
            id,
            topic: topic.clone(),
            receiver,
            broker: self.broker.clone(),
            stats: self.stats.clone(),
            cancelled: false,
        }
    }

    pub fn broker(&self) -> &Arc<Broker<E>> {
        &self.broker
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        let total_opened = self.stats.opened.load(Ordering::Relaxed);
        let total_closed = self.stats.closed.load(Ordering::Relaxed);
        ChannelSnapshot {
            active: total_opened.saturating_sub(total_closed),
            total_opened,
            total_closed,
        }
    }
}

/// Live per-subscriber delivery handle.
///
/// Cancelling (explicitly or by dropping) removes the channel from the broker
/// so no further events are enqueued. Events already enqueued before the
/// cancel stay readable.
pub struct Subscription<E: Clone + Send + 'static> {
    id: SubscriptionId,
    topic: Topic,
    receiver: mpsc::UnboundedReceiver<E>,
    broker: Arc<Broker<E>>,
    stats: Arc<ChannelStats>,
    cancelled: bool,
}

impl<E: Clone + Send + 'static> Subscription<E> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Next event, waiting if none is queued. Returns `None` once cancelled
    /// and drained.
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }

    /// Next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<E> {
        self.receiver.try_recv().ok()
    }

    /// Stop delivery to this channel. Safe to call more than once.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.broker.unsubscribe(&self.topic, self.id);
        self.receiver.close();
        self.stats.closed.fetch_add(1, Ordering::Relaxed);
        tracing::info!(topic = %self.topic, subscription_id = %self.id, "subscription closed");
    }
}

impl<E: Clone + Send + 'static> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<E: Clone + Send + 'static> Stream for Subscription<E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn manager() -> SubscriptionManager<u32> {
        SubscriptionManager::new(Arc::new(Broker::new()))
    }

    fn topic() -> Topic {
        Topic::new("t")
    }

    #[tokio::test]
    async fn test_open_and_receive() {
        let mgr = manager();
        let mut sub = mgr.open(&topic());
        mgr.broker().publish(&topic(), 3);
        assert_eq!(sub.recv().await, Some(3));
        assert_eq!(sub.topic(), &topic());
    }

    #[tokio::test]
    async fn test_stream_yields_in_order() {
        let mgr = manager();
        let sub = mgr.open(&topic());
        for i in 1..=3 {
            mgr.broker().publish(&topic(), i);
        }
        let got: Vec<u32> = sub.take(3).collect().await;
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mgr = manager();
        let mut a = mgr.open(&topic());
        let mut b = mgr.open(&topic());

        a.cancel();
        a.cancel();
        assert!(a.is_cancelled());
        assert_eq!(mgr.broker().subscriber_count(&topic()), 1);

        assert_eq!(mgr.broker().publish(&topic(), 9), 1);
        assert_eq!(a.try_recv(), None);
        assert_eq!(b.try_recv(), Some(9));

        let snap = mgr.snapshot();
        assert_eq!(snap.total_opened, 2);
        assert_eq!(snap.total_closed, 1);
        assert_eq!(snap.active, 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let mgr = manager();
        {
            let _sub = mgr.open(&topic());
            assert_eq!(mgr.broker().subscriber_count(&topic()), 1);
        }
        assert_eq!(mgr.broker().subscriber_count(&topic()), 0);
        assert_eq!(mgr.snapshot().active, 0);
    }

    #[test]
    fn test_cancel_then_drop_counts_once() {
        let mgr = manager();
        let mut sub = mgr.open(&topic());
        sub.cancel();
        drop(sub);
        assert_eq!(mgr.snapshot().total_closed, 1);
    }

    #[tokio::test]
    async fn test_enqueued_events_survive_cancel() {
        let mgr = manager();
        let mut sub = mgr.open(&topic());
        mgr.broker().publish(&topic(), 1);
        sub.cancel();
        mgr.broker().publish(&topic(), 2);
        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, None);
    }
}
