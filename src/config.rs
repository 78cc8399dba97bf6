//! Configuration for WatchKV
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::str::FromStr;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::KvError;

/// Main configuration for a WatchKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Watch Configuration
    // -------------------------------------------------------------------------
    /// Per-subscription delivery queue between a writer's fan-out and the
    /// watch consumer loop
    pub delivery_queue: DeliveryQueue,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 disables)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 disables)
    pub write_timeout_ms: u64,
}

/// Delivery queue policy for watch subscriptions
///
/// Decides whether slow watchers backpressure the writers of their key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryQueue {
    /// Unbuffered handoff: fan-out blocks until the watcher takes the value
    #[default]
    Rendezvous,

    /// Up to `capacity` values queue per watcher before fan-out blocks
    Bounded { capacity: usize },

    /// Fan-out never blocks; a stalled watcher accumulates values in memory
    Unbounded,
}

impl DeliveryQueue {
    /// Create a delivery channel with this policy
    pub(crate) fn channel<T>(&self) -> (Sender<T>, Receiver<T>) {
        match *self {
            DeliveryQueue::Rendezvous => channel::bounded(0),
            DeliveryQueue::Bounded { capacity } => channel::bounded(capacity),
            DeliveryQueue::Unbounded => channel::unbounded(),
        }
    }
}

impl fmt::Display for DeliveryQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryQueue::Rendezvous => write!(f, "rendezvous"),
            DeliveryQueue::Bounded { capacity } => write!(f, "{}", capacity),
            DeliveryQueue::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl FromStr for DeliveryQueue {
    type Err = KvError;

    /// Accepts `rendezvous`, `unbounded`, or a capacity (`0` means rendezvous)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rendezvous" | "0" => Ok(DeliveryQueue::Rendezvous),
            "unbounded" => Ok(DeliveryQueue::Unbounded),
            other => other
                .parse::<usize>()
                .map(|capacity| DeliveryQueue::Bounded { capacity })
                .map_err(|_| {
                    KvError::Config(format!(
                        "invalid delivery queue '{}': expected 'rendezvous', 'unbounded' or a capacity",
                        s
                    ))
                }),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delivery_queue: DeliveryQueue::Rendezvous,
            listen_addr: "127.0.0.1:50051".to_string(),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the watch delivery queue policy
    pub fn delivery_queue(mut self, queue: DeliveryQueue) -> Self {
        self.config.delivery_queue = queue;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
