//! Subscribe/unsubscribe event dispatch
//!
//! Subscribers are served in subscription order and every subscriber sees
//! events in the order they were published.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle returned by [`Dispatcher::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription
pub struct Subscription<E> {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<E>,
}

impl<E> Subscription<E> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event. `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }
}

struct Subscribers<E> {
    next_id: u64,
    senders: BTreeMap<SubscriptionId, mpsc::UnboundedSender<E>>,
}

/// Fan-out of events to any number of subscribers
pub struct Dispatcher<E> {
    inner: Arc<Mutex<Subscribers<E>>>,
}

impl<E> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clone> Dispatcher<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Subscribers {
                next_id: 0,
                senders: BTreeMap::new(),
            })),
        }
    }

    pub fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.senders.insert(id, tx);
        Subscription { id, rx }
    }

    /// Stop delivering to `id`. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.lock().senders.remove(&id).is_some()
    }

    /// Deliver `event` to every live subscriber, returning how many got it.
    /// Subscribers whose receiver was dropped are pruned.
    pub fn publish(&self, event: E) -> usize {
        let mut inner = self.inner.lock();
        inner.senders.retain(|_, tx| tx.send(event.clone()).is_ok());
        inner.senders.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().senders.len()
    }
}

impl<E: Clone> Default for Dispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}
