//! Watch Module
//!
//! Live per-key change subscriptions.
//!
//! ## Responsibilities
//! - Register and remove watchers per key ([`WatcherRegistry`])
//! - Fan every successful write out to the watchers of its key
//! - Keep per-key notification order equal to write order ([`Sequencer`])
//! - Run the consumer side of one watch until cancelled or its limit
//!   is reached ([`Watch`])
//!
//! ## Delivery
//! ```text
//!   Store::update ──► Sequencer turn ──► WatcherRegistry::notify
//!                                              │ send (blocks per DeliveryQueue)
//!                          ┌───────────────────┼───────────────────┐
//!                          ▼                   ▼                   ▼
//!                     Watch (id 1)        Watch (id 2)        Watch (id 3)
//!                     select! { value | cancel }
//! ```
//!
//! With the default rendezvous queue a watcher that stops consuming stalls
//! fan-out for its key, and with it the writers of that key. Other keys are
//! unaffected.

mod registry;
mod sequencer;
mod stream;

pub use registry::{Subscription, SubscriptionId, WatcherRegistry};
pub use sequencer::{Sequencer, Turn};
pub use stream::Watch;
