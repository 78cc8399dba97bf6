//! Watch consumer loop
//!
//! Turns a registry subscription into a lazy sequence of records.

use std::sync::Arc;

use crossbeam::channel::Receiver;

use crate::cancel::CancelToken;
use crate::error::{KvError, Result};
use crate::record::Record;

use super::{Subscription, SubscriptionId, WatcherRegistry};

/// A live watch on one key
///
/// Yields every value written to the key after registration, in write order,
/// until one of:
/// - the cancel token fires (`next_record` returns `KvError::Cancelled`)
/// - `max_count` values have been delivered (`next_record` returns `Ok(None)`)
///
/// The subscription is removed from the registry exactly once, as soon as
/// the watch ends or when it is dropped, whichever comes first. The delivery
/// channel is only discarded after that, so a blocked fan-out always wakes up.
pub struct Watch {
    id: SubscriptionId,
    key: String,

    /// Delivery channel; taken by the first (and only) unsubscribe
    values: Option<Receiver<String>>,

    registry: Arc<WatcherRegistry>,
    cancel: CancelToken,

    /// Values still allowed; `None` is unbounded
    remaining: Option<usize>,
}

impl Watch {
    pub(crate) fn new(
        subscription: Subscription,
        registry: Arc<WatcherRegistry>,
        cancel: CancelToken,
        max_count: Option<usize>,
    ) -> Self {
        let Subscription { id, key, values } = subscription;
        Self {
            id,
            key,
            values: Some(values),
            registry,
            cancel,
            remaining: max_count,
        }
    }

    /// Block for the next value
    ///
    /// Races the next notified value against cancellation. Once cancelled no
    /// further values are returned, even if one was already queued.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        if self.values.is_none() {
            return Ok(None);
        }

        if self.remaining == Some(0) {
            self.finish();
            return Ok(None);
        }

        if self.cancel.is_cancelled() {
            self.finish();
            return Err(KvError::Cancelled);
        }

        let next = match self.values.as_ref() {
            Some(values) => crossbeam::channel::select! {
                recv(values) -> msg => match msg {
                    Ok(value) => Next::Value(value),
                    Err(_) => Next::Closed,
                },
                recv(self.cancel.signal()) -> _ => Next::Cancelled,
            },
            None => return Ok(None),
        };

        let value = match next {
            Next::Value(value) => value,
            Next::Cancelled => {
                self.finish();
                return Err(KvError::Cancelled);
            }
            Next::Closed => {
                // Sender gone without an unsubscribe; treat as end of stream
                self.finish();
                return Ok(None);
            }
        };

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                // Stop blocking writers before the caller handles the last value
                self.finish();
            }
        }

        tracing::trace!(subscription = %self.id, key = %self.key, "Delivered value");
        Ok(Some(Record::new(self.key.clone(), value)))
    }

    /// End the watch now. Idempotent.
    pub fn unsubscribe(&mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.values.is_none() {
            return;
        }
        self.registry.unsubscribe(&self.key, self.id);
        // Only now discard the channel; a fan-out that picked this watch
        // before the unsubscribe fails its handoff instead of blocking
        self.values = None;
    }

    /// Whether the watch is still registered
    pub fn is_active(&self) -> bool {
        self.values.is_some()
    }

    /// The watched key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The registry handle of this watch
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// Outcome of one wait in `next_record`
enum Next {
    Value(String),
    Closed,
    Cancelled,
}

impl Iterator for Watch {
    type Item = Record;

    /// Cancellation ends iteration like a reached limit does; use
    /// `next_record` to tell them apart.
    fn next(&mut self) -> Option<Record> {
        self.next_record().ok().flatten()
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("remaining", &self.remaining)
            .field("active", &self.is_active())
            .finish()
    }
}
