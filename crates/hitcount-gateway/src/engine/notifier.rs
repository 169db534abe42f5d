//! Live-tail change fan-out.
//!
//! `publish` wakes every live subscriber of a counter; with nobody
//! subscribed the event is dropped. Delivery is at-least-once per live
//! subscriber and consumers must be idempotent: a subscriber that lags behind
//! the channel capacity skips ahead instead of failing.
//!
//! The subscriber table is the one piece of shared in-process state. Subscribe
//! and unsubscribe both run under the table's shard lock for the key, so an
//! entry is removed exactly when its last receiver goes away.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::Stream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use hitcount_core::CounterKey;

type Table = DashMap<CounterKey, broadcast::Sender<i64>>;

pub struct ChangeNotifier {
    subscribers: Arc<Table>,
    capacity: usize,
}

impl ChangeNotifier {
    /// `capacity` bounds how many unread events one subscriber may fall behind by.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Returns how many subscribers were woken.
    pub fn publish(&self, key: &CounterKey, value: i64) -> usize {
        match self.subscribers.get(key) {
            Some(tx) => tx.send(value).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscribe(&self, key: &CounterKey) -> Subscription {
        let rx = self
            .subscribers
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        Subscription {
            key: key.clone(),
            rx: Some(rx),
            table: Arc::clone(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self, key: &CounterKey) -> usize {
        self.subscribers
            .get(key)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn watched_keys(&self) -> usize {
        self.subscribers.len()
    }

    pub fn total_subscribers(&self) -> usize {
        self.subscribers.iter().map(|e| e.value().receiver_count()).sum()
    }
}

/// One live subscription. Dropping it unsubscribes.
pub struct Subscription {
    key: CounterKey,
    rx: Option<broadcast::Receiver<i64>>,
    table: Arc<Table>,
}

impl Subscription {
    pub fn key(&self) -> &CounterKey {
        &self.key
    }

    /// Next published value. `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<i64> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(v) => return Some(v),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::trace!(key = %self.key, skipped, "subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Lazy, unbounded stream of values; ends only if the channel closes.
    pub fn into_stream(self) -> impl Stream<Item = i64> + Send {
        futures_util::stream::unfold(self, |mut sub| async move {
            let v = sub.recv().await?;
            Some((v, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        drop(self.rx.take());
        self.table
            .remove_if(&self.key, |_, tx| tx.receiver_count() == 0);
    }
}
