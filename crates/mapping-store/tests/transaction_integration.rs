//! Integration tests for scoped transactions against real store files.

use std::sync::Arc;
use std::thread;

use l1_mapping_store::{
    InMemoryLocker, MappingSet, MappingStore, MappingValue, PathLocker, StoreError,
};
use pretty_assertions::assert_eq;

const PAIRS: usize = 16;

fn run_disjoint_pairs(store: &MappingStore, path: &std::path::Path) {
    thread::scope(|s| {
        for i in 0..PAIRS {
            s.spawn(move || {
                let a = format!("10.0.0.1/1/{}", 2 * i + 1);
                let b = format!("10.0.0.1/1/{}", 2 * i + 2);
                store
                    .transaction(path, |m| {
                        m.insert(a.clone(), MappingValue::port(b.clone()));
                        // Widen the read-modify-write window.
                        thread::yield_now();
                        m.insert(b, MappingValue::port(a));
                        Ok::<_, StoreError>(())
                    })
                    .unwrap();
            });
        }
    });
}

#[test]
fn test_concurrent_transactions_lose_nothing_in_memory_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("10-0-0-1-mappings.yaml");
    let locker: Arc<dyn PathLocker> = Arc::new(InMemoryLocker::new());
    let store = MappingStore::with_locker(locker);

    run_disjoint_pairs(&store, &path);

    assert_eq!(store.read(&path).unwrap().len(), 2 * PAIRS);
}

#[cfg(unix)]
#[test]
fn test_concurrent_transactions_lose_nothing_file_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("10-0-0-1-mappings.yaml");
    let store = MappingStore::new();

    run_disjoint_pairs(&store, &path);

    let mappings = store.read(&path).unwrap();
    assert_eq!(mappings.len(), 2 * PAIRS);
    for i in 0..PAIRS {
        let a = format!("10.0.0.1/1/{}", 2 * i + 1);
        let b = format!("10.0.0.1/1/{}", 2 * i + 2);
        assert_eq!(mappings.peer_of(&a), Some(b.as_str()));
        assert_eq!(mappings.peer_of(&b), Some(a.as_str()));
    }
}

#[test]
fn test_round_trip_through_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dev-mappings.yaml");
    let written: MappingSet = [
        ("dev/1/1", "dev/1/2"),
        ("dev/1/2", "dev/1/1"),
        ("dev/2/5", "dev/1/3"),
        ("dev/2/6", "EXCEPT: loss of signal"),
    ]
    .into_iter()
    .collect();

    let first = MappingStore::with_locker(Arc::new(InMemoryLocker::new()));
    let to_write = written.clone();
    first
        .transaction(&path, move |m| {
            *m = to_write;
            Ok::<_, StoreError>(())
        })
        .unwrap();

    let second = MappingStore::with_locker(Arc::new(InMemoryLocker::new()));
    assert_eq!(second.read(&path).unwrap(), written);
}

#[test]
fn test_independent_files_do_not_share_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = MappingStore::with_locker(Arc::new(InMemoryLocker::new()));
    let first = dir.path().join("a-mappings.yaml");
    let second = dir.path().join("b-mappings.yaml");

    store
        .transaction(&first, |m| {
            m.insert("x", MappingValue::port("y"));
            Ok::<_, StoreError>(())
        })
        .unwrap();

    assert_eq!(store.read(&first).unwrap().len(), 1);
    assert!(store.read(&second).unwrap().is_empty());
}
