//! Store implementation
//!
//! HashMap-based store with RwLock for concurrency.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{KvError, Result};
use crate::record::Record;
use crate::watch::{Sequencer, WatcherRegistry};

/// Current value of one key plus its notification ordering state
struct Slot {
    value: String,

    /// Ticket for the next write to this key (guarded by the map lock)
    next_ticket: u64,

    /// Serves tickets in issue order during fan-out
    sequencer: Arc<Sequencer>,
}

/// In-memory key-value store that notifies watchers on every write
///
/// ## Concurrency:
/// - `map`: RwLock (many concurrent readers, one writer across all keys)
/// - Fan-out: outside the map lock, serialized per key by ticket
/// - All methods use `&self`
pub struct Store {
    /// Key → current value; keys are never removed
    map: RwLock<HashMap<String, Slot>>,

    /// Receives every successful write
    registry: Arc<WatcherRegistry>,
}

impl Store {
    /// Create an empty store that notifies `registry`
    pub fn new(registry: Arc<WatcherRegistry>) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            registry,
        }
    }

    /// Get the current record for `name`
    pub fn get(&self, name: &str) -> Result<Record> {
        let map = self.map.read();
        match map.get(name) {
            Some(slot) => Ok(Record::new(name, slot.value.clone())),
            None => Err(KvError::NotFound(name.to_string())),
        }
    }

    /// Insert a new key
    ///
    /// Fails with `AlreadyExists` (leaving the stored value untouched) if
    /// `name` is present.
    pub fn create(&self, name: &str, value: &str) -> Result<Record> {
        let sequencer = {
            let mut map = self.map.write();

            if map.contains_key(name) {
                return Err(KvError::AlreadyExists(name.to_string()));
            }

            let sequencer = Arc::new(Sequencer::new());
            map.insert(
                name.to_string(),
                Slot {
                    value: value.to_string(),
                    next_ticket: 1,
                    sequencer: Arc::clone(&sequencer),
                },
            );
            sequencer
        };

        tracing::debug!(key = name, "Created record");
        self.publish(name, value, &sequencer, 0);

        Ok(Record::new(name, value))
    }

    /// Overwrite an existing key
    ///
    /// Fails with `NotFound` if `name` is absent.
    pub fn update(&self, name: &str, value: &str) -> Result<Record> {
        let (sequencer, ticket) = {
            let mut map = self.map.write();

            let slot = map
                .get_mut(name)
                .ok_or_else(|| KvError::NotFound(name.to_string()))?;

            slot.value = value.to_string();
            let ticket = slot.next_ticket;
            slot.next_ticket += 1;
            (Arc::clone(&slot.sequencer), ticket)
        };

        tracing::debug!(key = name, ticket, "Updated record");
        self.publish(name, value, &sequencer, ticket);

        Ok(Record::new(name, value))
    }

    /// Fan a write out once every earlier write to the same key has been fanned out
    fn publish(&self, name: &str, value: &str, sequencer: &Sequencer, ticket: u64) {
        let _turn = sequencer.wait_turn(ticket);
        self.registry.notify(name, value);
    }

    /// Whether `name` currently has a value
    pub fn contains(&self, name: &str) -> bool {
        self.map.read().contains_key(name)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// The registry this store notifies
    pub fn registry(&self) -> &Arc<WatcherRegistry> {
        &self.registry
    }
}
