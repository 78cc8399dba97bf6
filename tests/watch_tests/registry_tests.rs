//! Watcher Registry Tests
//!
//! Tests verify:
//! - Subscribe / unsubscribe bookkeeping
//! - Fan-out reaches every watcher of a key, in registration order
//! - Unsubscribing is idempotent and never disturbs other watchers
//! - Blocking handoff with the rendezvous delivery queue

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use watchkv::config::DeliveryQueue;
use watchkv::watch::{SubscriptionId, WatcherRegistry};

// =============================================================================
// Bookkeeping Tests
// =============================================================================

#[test]
fn test_new_registry_is_empty() {
    let registry = WatcherRegistry::default();
    assert_eq!(registry.watched_key_count(), 0);
    assert_eq!(registry.watcher_count("foo"), 0);
    assert_eq!(registry.delivery(), DeliveryQueue::Rendezvous);
}

#[test]
fn test_subscribe_assigns_unique_ids() {
    let registry = WatcherRegistry::new(DeliveryQueue::Unbounded);

    let a = registry.subscribe("foo");
    let b = registry.subscribe("foo");
    let c = registry.subscribe("bar");

    assert_ne!(a.id, b.id);
    assert_ne!(b.id, c.id);
    assert!(a.id < b.id);
    assert_eq!(a.key, "foo");
    assert_eq!(c.key, "bar");

    assert_eq!(registry.watcher_count("foo"), 2);
    assert_eq!(registry.watcher_count("bar"), 1);
    assert_eq!(registry.watched_key_count(), 2);
}

#[test]
fn test_unsubscribe_removes_only_that_watcher() {
    let registry = WatcherRegistry::new(DeliveryQueue::Unbounded);

    let a = registry.subscribe("foo");
    let b = registry.subscribe("foo");

    assert!(registry.unsubscribe("foo", a.id));
    assert_eq!(registry.watcher_count("foo"), 1);

    registry.notify("foo", "oof");
    assert_eq!(b.values.try_recv().unwrap(), "oof");
    assert!(a.values.try_recv().is_err());
}

#[test]
fn test_unsubscribe_twice_is_noop() {
    let registry = WatcherRegistry::new(DeliveryQueue::Unbounded);
    let a = registry.subscribe("foo");
    let b = registry.subscribe("foo");

    assert!(registry.unsubscribe("foo", a.id));
    assert!(!registry.unsubscribe("foo", a.id));

    // The other watcher is untouched by the repeated removal
    assert_eq!(registry.watcher_count("foo"), 1);
    registry.notify("foo", "still here");
    assert_eq!(b.values.try_recv().unwrap(), "still here");
}

#[test]
fn test_unsubscribe_unknown_is_noop() {
    let registry = WatcherRegistry::new(DeliveryQueue::Unbounded);
    let a = registry.subscribe("foo");

    assert!(!registry.unsubscribe("foo", SubscriptionId(9999)));
    assert!(!registry.unsubscribe("never-watched", a.id));
    assert_eq!(registry.watcher_count("foo"), 1);
}

#[test]
fn test_last_unsubscribe_drops_key() {
    let registry = WatcherRegistry::new(DeliveryQueue::Unbounded);
    let a = registry.subscribe("foo");

    registry.unsubscribe("foo", a.id);
    assert_eq!(registry.watched_key_count(), 0);

    // Key can be watched again afterwards
    let b = registry.subscribe("foo");
    assert_eq!(registry.watcher_count("foo"), 1);
    registry.notify("foo", "again");
    assert_eq!(b.values.try_recv().unwrap(), "again");
}

// =============================================================================
// Fan-out Tests
// =============================================================================

#[test]
fn test_notify_without_watchers() {
    let registry = WatcherRegistry::default();
    assert_eq!(registry.notify("nobody", "value"), 0);
}

#[test]
fn test_notify_reaches_every_watcher() {
    let registry = WatcherRegistry::new(DeliveryQueue::Unbounded);
    let subs: Vec<_> = (0..5).map(|_| registry.subscribe("foo")).collect();

    assert_eq!(registry.notify("foo", "oof"), 5);

    for sub in &subs {
        assert_eq!(sub.values.try_recv().unwrap(), "oof");
    }
}

#[test]
fn test_notify_only_reaches_same_key() {
    let registry = WatcherRegistry::new(DeliveryQueue::Unbounded);
    let foo = registry.subscribe("foo");
    let bar = registry.subscribe("bar");

    registry.notify("foo", "oof");

    assert_eq!(foo.values.try_recv().unwrap(), "oof");
    assert!(bar.values.try_recv().is_err());
}

#[test]
fn test_subscription_has_no_backlog() {
    let registry = WatcherRegistry::new(DeliveryQueue::Unbounded);
    let early = registry.subscribe("foo");

    registry.notify("foo", "before");
    let late = registry.subscribe("foo");
    registry.notify("foo", "after");

    assert_eq!(early.values.try_iter().collect::<Vec<_>>(), vec!["before", "after"]);
    assert_eq!(late.values.try_iter().collect::<Vec<_>>(), vec!["after"]);
}

#[test]
fn test_notify_skips_dropped_receiver() {
    let registry = WatcherRegistry::default();
    let gone = registry.subscribe("foo");
    drop(gone.values);

    // Rendezvous send to a dropped receiver fails instead of blocking
    assert_eq!(registry.notify("foo", "oof"), 0);
}

// =============================================================================
// Rendezvous Delivery Tests
// =============================================================================

#[test]
fn test_rendezvous_delivers_in_registration_order() {
    let registry = Arc::new(WatcherRegistry::new(DeliveryQueue::Rendezvous));
    let first = registry.subscribe("foo");
    let second = registry.subscribe("foo");

    let notifier = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || registry.notify("foo", "oof"))
    };

    // The second watcher cannot receive until the first has taken its value
    thread::sleep(Duration::from_millis(20));
    assert!(second.values.try_recv().is_err());

    assert_eq!(first.values.recv().unwrap(), "oof");
    assert_eq!(second.values.recv().unwrap(), "oof");
    assert_eq!(notifier.join().unwrap(), 2);
}

#[test]
fn test_rendezvous_blocks_until_received() {
    let registry = Arc::new(WatcherRegistry::new(DeliveryQueue::Rendezvous));
    let sub = registry.subscribe("foo");

    let notifier = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || registry.notify("foo", "oof"))
    };

    thread::sleep(Duration::from_millis(20));
    assert!(!notifier.is_finished());

    assert_eq!(sub.values.recv().unwrap(), "oof");
    assert_eq!(notifier.join().unwrap(), 1);
}

#[test]
fn test_unsubscribe_while_notify_blocked() {
    let registry = Arc::new(WatcherRegistry::new(DeliveryQueue::Rendezvous));
    let sub = registry.subscribe("foo");

    let notifier = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || registry.notify("foo", "oof"))
    };

    thread::sleep(Duration::from_millis(20));

    // Unsubscribe must not wait for the blocked delivery
    assert!(registry.unsubscribe("foo", sub.id));
    drop(sub.values);

    assert_eq!(notifier.join().unwrap(), 0);
    assert_eq!(registry.watcher_count("foo"), 0);
}

#[test]
fn test_bounded_queue_buffers_up_to_capacity() {
    let registry = WatcherRegistry::new(DeliveryQueue::Bounded { capacity: 2 });
    let sub = registry.subscribe("foo");

    registry.notify("foo", "a");
    registry.notify("foo", "b");

    assert_eq!(sub.values.len(), 2);
    assert_eq!(sub.values.try_iter().collect::<Vec<_>>(), vec!["a", "b"]);
}
