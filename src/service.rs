//! Service Module
//!
//! The key-value service handed to the network layer.
//!
//! ## Responsibilities
//! - Own exactly one Store and one WatcherRegistry (no global state)
//! - Expose Get / Create / Update / Watch to the boundary layer
//! - Route protocol requests to the matching operation

use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::Result;
use crate::protocol::Request;
use crate::record::Record;
use crate::store::Store;
use crate::watch::{Watch, WatcherRegistry};

/// Explicitly constructed owner of the store and its watchers
///
/// Build one at startup, share it via `Arc`, drop it at shutdown.
pub struct KvService {
    /// Service configuration
    config: Config,

    /// Key → value map
    store: Store,

    /// Per-key watchers, shared with the store and every live watch
    registry: Arc<WatcherRegistry>,
}

impl KvService {
    /// Create an empty service
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(WatcherRegistry::new(config.delivery_queue));
        let store = Store::new(Arc::clone(&registry));

        Self {
            config,
            store,
            registry,
        }
    }

    /// Get the record at `name`
    pub fn get(&self, name: &str) -> Result<Record> {
        self.store.get(name)
    }

    /// Create the record at `name`; fails if it exists
    pub fn create(&self, name: &str, value: &str) -> Result<Record> {
        self.store.create(name, value)
    }

    /// Overwrite the record at `name`; fails if it is missing
    pub fn update(&self, name: &str, value: &str) -> Result<Record> {
        self.store.update(name, value)
    }

    /// Watch `name` for writes
    ///
    /// The subscription is registered before this returns, so every write
    /// that starts afterwards is delivered. Ends when `cancel` fires or after
    /// `max_count` values (`None` for unbounded).
    pub fn watch(&self, name: &str, cancel: CancelToken, max_count: Option<usize>) -> Watch {
        let subscription = self.registry.subscribe(name);
        Watch::new(subscription, Arc::clone(&self.registry), cancel, max_count)
    }

    /// Execute a unary request
    ///
    /// Watch requests are streams and are served by the caller through
    /// [`KvService::watch`]; they, `CancelWatch` and `Ping` yield `None`.
    pub fn execute(&self, request: &Request) -> Option<Result<Record>> {
        match request {
            Request::Get { name } => Some(self.get(name)),
            Request::Create { record } => Some(self.create(&record.name, &record.value)),
            Request::Update { record } => Some(self.update(&record.name, &record.value)),
            Request::Watch { .. } | Request::CancelWatch | Request::Ping => None,
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of active watchers on `name`
    pub fn watcher_count(&self, name: &str) -> usize {
        self.registry.watcher_count(name)
    }

    /// Number of stored keys
    pub fn record_count(&self) -> usize {
        self.store.len()
    }

    /// The watcher registry
    pub fn registry(&self) -> &Arc<WatcherRegistry> {
        &self.registry
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Default for KvService {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
