mod common;

use common::Person;
use lessonplan_core::{IdentityRegistry, RegistryError};
use std::sync::Arc;
use std::thread;

fn tracked(id: i64) -> Person {
    Person {
        id: Some(id),
        name: format!("p{id}"),
        age: 20,
    }
}

#[test]
fn concurrent_add_of_same_identity_admits_exactly_one() {
    let registry = Arc::new(IdentityRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.add(&tracked(42)))
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, RegistryError::AlreadyTracked { id: 42, .. })));
    assert_eq!(registry.len(), 1);
}

#[test]
fn concurrent_add_and_delete_keep_registry_consistent() {
    let registry = Arc::new(IdentityRegistry::new());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for offset in 0..250 {
                    let id = worker * 1_000 + offset;
                    registry.add(&tracked(id)).unwrap();
                    if offset % 2 == 0 {
                        registry.delete_by_id::<Person>(id).unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let ids = registry.tracked_ids::<Person>();
    assert_eq!(ids.len(), 4 * 125);
    assert!(ids.iter().all(|id| id % 2 == 1));
}
