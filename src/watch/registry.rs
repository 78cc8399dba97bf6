//! Watcher registry
//!
//! Per-key sets of live subscriptions and the fan-out that feeds them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::channel::{Receiver, Sender};
use dashmap::DashMap;

use crate::config::DeliveryQueue;

/// Unique handle of one subscription
///
/// Ids grow monotonically, so ordering by id is registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The caller's end of one registration
#[derive(Debug)]
pub struct Subscription {
    /// Handle used to unsubscribe
    pub id: SubscriptionId,

    /// Watched key
    pub key: String,

    /// Values written to `key`, in write order
    pub values: Receiver<String>,
}

/// Registry of watchers, grouped by key
///
/// ## Concurrency
/// - `watchers`: sharded map, so subscribe/unsubscribe on unrelated keys never
///   contend and no shard lock is held while a value is being delivered
/// - Per-key subscribers sit in a `BTreeMap` keyed by id: removal by handle
///   never disturbs the other entries, and iteration is registration order
/// - `notify` delivers from a snapshot of the senders, so an unsubscribe can
///   always make progress while a delivery to a slow watcher is blocked
pub struct WatcherRegistry {
    /// Active subscribers by key; keys with no subscribers are removed
    watchers: DashMap<String, BTreeMap<SubscriptionId, Sender<String>>>,

    /// Next subscription id (monotonically increasing)
    next_id: AtomicU64,

    /// Channel policy for new subscriptions
    delivery: DeliveryQueue,
}

impl WatcherRegistry {
    /// Create an empty registry
    pub fn new(delivery: DeliveryQueue) -> Self {
        Self {
            watchers: DashMap::new(),
            next_id: AtomicU64::new(1),
            delivery,
        }
    }

    /// Register a new watcher for `key`
    ///
    /// The key need not exist in the store. The subscription starts with an
    /// empty backlog and sees every value notified after this call returns.
    pub fn subscribe(&self, key: &str) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, values) = self.delivery.channel();

        self.watchers
            .entry(key.to_string())
            .or_default()
            .insert(id, sender);

        tracing::debug!(subscription = %id, key, delivery = %self.delivery, "Adding watcher");

        Subscription {
            id,
            key: key.to_string(),
            values,
        }
    }

    /// Remove a watcher
    ///
    /// Returns whether the subscription was still registered; removing an
    /// unknown or already-removed id is a no-op.
    pub fn unsubscribe(&self, key: &str, id: SubscriptionId) -> bool {
        let removed = match self.watchers.get_mut(key) {
            Some(mut subscribers) => subscribers.remove(&id).is_some(),
            None => false,
        };

        // Atomic check-and-remove so a concurrent subscribe is never lost
        self.watchers.remove_if(key, |_, subscribers| subscribers.is_empty());

        if removed {
            tracing::debug!(subscription = %id, key, "Removing watcher");
        }
        removed
    }

    /// Deliver `value` to every watcher of `key`, oldest registration first
    ///
    /// Each handoff blocks according to the delivery queue policy, so a slow
    /// watcher delays this call. Watchers that unsubscribed after the snapshot
    /// was taken are skipped once their receiver is gone.
    ///
    /// Returns the number of watchers that accepted the value.
    pub fn notify(&self, key: &str, value: &str) -> usize {
        let targets: Vec<(SubscriptionId, Sender<String>)> = match self.watchers.get(key) {
            Some(subscribers) => subscribers
                .iter()
                .map(|(id, sender)| (*id, sender.clone()))
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, sender) in targets {
            tracing::trace!(subscription = %id, key, "Notifying watcher");
            match sender.send(value.to_string()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::trace!(subscription = %id, key, "Watcher went away during delivery");
                }
            }
        }

        tracing::debug!(key, delivered, "Fan-out complete");
        delivered
    }

    /// Number of active watchers for `key`
    pub fn watcher_count(&self, key: &str) -> usize {
        self.watchers.get(key).map(|s| s.len()).unwrap_or(0)
    }

    /// Number of keys with at least one watcher
    pub fn watched_key_count(&self) -> usize {
        self.watchers.len()
    }

    /// The delivery queue policy used for new subscriptions
    pub fn delivery(&self) -> DeliveryQueue {
        self.delivery
    }
}

impl Default for WatcherRegistry {
    fn default() -> Self {
        Self::new(DeliveryQueue::default())
    }
}
