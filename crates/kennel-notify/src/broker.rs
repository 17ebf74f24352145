//! In-process publish/subscribe hub.
//!
//! The registry maps each topic to its currently open subscriber channels.
//! Subscribe, unsubscribe and the fan-out enumeration in publish all hold the
//! same lock, so a publish racing an unsubscribe either reaches the channel
//! or does not; it never observes a half-removed entry.
//!
//! Each subscriber gets its own unbounded queue. Publishing only enqueues,
//! so a slow consumer never holds up the publisher or other subscribers.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use kennel_core::Topic;
use tokio::sync::mpsc;

/// Identifies one registered subscriber channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Registry<E> = HashMap<Topic, HashMap<SubscriptionId, mpsc::UnboundedSender<E>>>;

/// Topic-keyed fan-out of events of type `E`.
///
/// Owned explicitly (usually as `Arc<Broker<E>>`) and shared by reference;
/// there is no process-global instance.
pub struct Broker<E> {
    registry: Mutex<Registry<E>>,
    next_id: AtomicU64,
}

impl<E: Clone + Send + 'static> Broker<E> {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    // The registry holds plain data; a panic elsewhere cannot leave it
    // structurally broken, so a poisoned lock is still usable.
    fn registry(&self) -> MutexGuard<'_, Registry<E>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new channel under `topic`.
    ///
    /// The receiver yields every event published to `topic` after this call
    /// returns, in publish order. Nothing published earlier is replayed.
    pub fn subscribe(&self, topic: &Topic) -> (SubscriptionId, mpsc::UnboundedReceiver<E>) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry()
            .entry(topic.clone())
            .or_default()
            .insert(id, tx);
        tracing::debug!(topic = %topic, subscription_id = %id, "subscriber registered");
        (id, rx)
    }

    /// Remove a channel. Returns whether it was still registered; removing an
    /// unknown or already-removed channel is a no-op.
    pub fn unsubscribe(&self, topic: &Topic, id: SubscriptionId) -> bool {
        let mut registry = self.registry();
        let removed = match registry.get_mut(topic) {
            Some(channels) => {
                let removed = channels.remove(&id).is_some();
                if channels.is_empty() {
                    registry.remove(topic);
                }
                removed
            }
            None => false,
        };
        if removed {
            tracing::debug!(topic = %topic, subscription_id = %id, "subscriber removed");
        }
        removed
    }

    /// Deliver `event` to every channel currently registered on `topic`.
    ///
    /// Returns the number of channels the event was enqueued on. Zero
    /// subscribers is not an error. Channels whose receiving side has gone
    /// away are pruned.
    pub fn publish(&self, topic: &Topic, event: E) -> usize {
        let mut registry = self.registry();
        let Some(channels) = registry.get_mut(topic) else {
            tracing::trace!(topic = %topic, "publish with no subscribers");
            return 0;
        };

        let mut delivered = 0;
        channels.retain(|id, tx| match tx.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                tracing::debug!(topic = %topic, subscription_id = %id, "pruned closed subscriber");
                false
            }
        });
        if channels.is_empty() {
            registry.remove(topic);
        }
        delivered
    }

    /// Number of channels currently registered on `topic`.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.registry().get(topic).map(HashMap::len).unwrap_or(0)
    }

    /// Topics with at least one registered channel.
    pub fn topics(&self) -> Vec<Topic> {
        self.registry().keys().cloned().collect()
    }
}

impl<E: Clone + Send + 'static> Default for Broker<E> {
    fn default() -> Self {
        Self::new()
    }
}
