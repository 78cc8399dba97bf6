//! # WatchKV
//!
//! An in-memory key-value store with live per-key watches:
//! - Point reads, creates and updates on string keys
//! - Watches that stream every subsequent value of a key, in write order
//! - Reader/writer-locked map, per-key ordered fan-out
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │          (thread per connection, one watch per stream)       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     KvService                                │
//! │             (owns one Store + one Registry)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐  notify   ┌─────────────────┐
//!   │    Store    │──────────►│ WatcherRegistry │
//!   │  (RwLock)   │ per-key   │   (DashMap)     │
//!   └─────────────┘ sequencer └────────┬────────┘
//!                                      │ delivery queue
//!                                      ▼
//!                              ┌───────────────┐
//!                              │     Watch     │
//!                              │  (select! on  │
//!                              │ value/cancel) │
//!                              └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod cancel;
pub mod watch;
pub mod store;
pub mod service;
pub mod protocol;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{Config, DeliveryQueue};
pub use record::Record;
pub use cancel::CancelToken;
pub use service::KvService;
pub use watch::Watch;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of WatchKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
