//! Store Tests
//!
//! Tests verify:
//! - Get / Create / Update semantics
//! - Conflict and missing-key errors
//! - Every successful write reaches the registry
//! - Per-key notification order under concurrent writers

use std::sync::Arc;
use std::thread;

use watchkv::config::DeliveryQueue;
use watchkv::store::Store;
use watchkv::watch::WatcherRegistry;
use watchkv::KvError;

fn unbounded_store() -> (Store, Arc<WatcherRegistry>) {
    let registry = Arc::new(WatcherRegistry::new(DeliveryQueue::Unbounded));
    (Store::new(Arc::clone(&registry)), registry)
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_store_is_empty() {
    let (store, _) = unbounded_store();
    assert!(store.is_empty());
    assert_eq!(store.len(), 0);
}

#[test]
fn test_create_and_get() {
    let (store, _) = unbounded_store();

    let created = store.create("foo", "oof").unwrap();
    assert_eq!(created.name, "foo");
    assert_eq!(created.value, "oof");

    let record = store.get("foo").unwrap();
    assert_eq!(record.name, "foo");
    assert_eq!(record.value, "oof");
    assert_eq!(store.len(), 1);
    assert!(store.contains("foo"));
}

#[test]
fn test_get_missing_key() {
    let (store, _) = unbounded_store();

    match store.get("nope") {
        Err(KvError::NotFound(name)) => assert_eq!(name, "nope"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_create_existing_key_fails() {
    let (store, _) = unbounded_store();
    store.create("foo", "oof").unwrap();

    match store.create("foo", "other") {
        Err(KvError::AlreadyExists(name)) => assert_eq!(name, "foo"),
        other => panic!("Expected AlreadyExists, got {:?}", other),
    }

    // Stored value untouched
    assert_eq!(store.get("foo").unwrap().value, "oof");
}

#[test]
fn test_update_existing_key() {
    let (store, _) = unbounded_store();
    store.create("foo", "oof").unwrap();

    let updated = store.update("foo", "bigoof").unwrap();
    assert_eq!(updated.value, "bigoof");
    assert_eq!(store.get("foo").unwrap().value, "bigoof");
    assert_eq!(store.len(), 1);
}

#[test]
fn test_update_missing_key_fails() {
    let (store, _) = unbounded_store();

    match store.update("ghost", "boo") {
        Err(KvError::NotFound(name)) => assert_eq!(name, "ghost"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
    assert!(!store.contains("ghost"));
}

#[test]
fn test_empty_name_and_value() {
    let (store, _) = unbounded_store();

    store.create("", "").unwrap();
    assert_eq!(store.get("").unwrap().value, "");
}

// =============================================================================
// Notification Tests
// =============================================================================

#[test]
fn test_create_and_update_notify_watchers() {
    let (store, registry) = unbounded_store();
    let subscription = registry.subscribe("foo");

    store.create("foo", "oof").unwrap();
    store.update("foo", "bigoof").unwrap();

    assert_eq!(subscription.values.try_recv().unwrap(), "oof");
    assert_eq!(subscription.values.try_recv().unwrap(), "bigoof");
    assert!(subscription.values.try_recv().is_err());
}

#[test]
fn test_failed_writes_do_not_notify() {
    let (store, registry) = unbounded_store();
    store.create("foo", "oof").unwrap();

    let subscription = registry.subscribe("foo");
    assert!(store.create("foo", "again").is_err());

    let missing = registry.subscribe("bar");
    assert!(store.update("bar", "x").is_err());

    assert!(subscription.values.try_recv().is_err());
    assert!(missing.values.try_recv().is_err());
}

#[test]
fn test_writes_to_other_keys_not_delivered() {
    let (store, registry) = unbounded_store();
    let subscription = registry.subscribe("foo");

    store.create("bar", "rab").unwrap();
    store.update("bar", "bigrab").unwrap();

    assert!(subscription.values.try_recv().is_err());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_readers() {
    let (store, _) = unbounded_store();
    let store = Arc::new(store);
    store.create("shared", "value").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..1000 {
                    assert_eq!(store.get("shared").unwrap().value, "value");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_notifications_follow_write_order() {
    let (store, registry) = unbounded_store();
    let store = Arc::new(store);
    store.create("counter", "0").unwrap();

    let subscription = registry.subscribe("counter");

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..250 {
                    store.update("counter", &format!("{}-{}", t, i)).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let delivered: Vec<String> = subscription.values.try_iter().collect();
    assert_eq!(delivered.len(), 1000);

    // Each writer's own values arrive in the order it wrote them
    for t in 0..4 {
        let prefix = format!("{}-", t);
        let seq: Vec<usize> = delivered
            .iter()
            .filter_map(|v| v.strip_prefix(&prefix))
            .map(|i| i.parse().unwrap())
            .collect();
        assert_eq!(seq, (0..250).collect::<Vec<_>>());
    }

    // The last delivered value is the stored one
    assert_eq!(&store.get("counter").unwrap().value, delivered.last().unwrap());
}

#[test]
fn test_concurrent_creates_single_winner() {
    let (store, _) = unbounded_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.create("race", &t.to_string()).is_ok())
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
    assert_eq!(store.len(), 1);
}
