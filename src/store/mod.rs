//! Store Module
//!
//! The in-memory map from key to current value.
//!
//! ## Responsibilities
//! - Enforce create/update/read semantics and existence invariants
//! - Hand every successful write to the watcher registry, in write order
//!
//! ## Concurrency Model
//! One `RwLock` over the whole map: reads share it, creates and updates are
//! exclusive across all keys. Fan-out runs after the write lock is released,
//! ordered per key by a [`Sequencer`](crate::watch::Sequencer) ticket drawn
//! while the lock was held, so a slow watcher delays only the writers of its
//! own key and never blocks readers.

mod map;

pub use map::Store;
