mod common;

use chrono::Duration;
use common::{license_for, now, request};
use std::sync::{Arc, Barrier};
use std::thread;
use tessera_license::{License, Limit, Tier};
use tessera_store::{ActivationLedger, ActivationOutcome, LicenseStore, NewLicense, SqliteStore};
use tessera_types::OwnerId;

fn store_with(tier: Tier) -> (SqliteStore, License) {
    let store = SqliteStore::open_in_memory().unwrap();
    let license = license_for(OwnerId::new(), tier);
    store
        .insert_license(NewLicense {
            license: &license,
            supersede: None,
            initial_activation: None,
        })
        .unwrap();
    (store, license)
}

#[test]
fn activate_creates_binding() {
    let (store, license) = store_with(Tier::Pro);
    let outcome = store
        .activate(&request(license.id, "hw-A"), license.max_activations, now())
        .unwrap();

    let ActivationOutcome::Created(activation) = outcome else {
        panic!("expected a new activation, got {outcome:?}");
    };
    assert_eq!(activation.hardware_id, "hw-A");
    assert_eq!(activation.hostname, "host-hw-A");
    assert!(activation.is_active());
    assert_eq!(store.count_active(license.id).unwrap(), 1);
}

#[test]
fn reactivation_is_idempotent_refresh() {
    let (store, license) = store_with(Tier::Community);
    let first_at = now();
    let ActivationOutcome::Created(first) = store
        .activate(&request(license.id, "hw-A"), license.max_activations, first_at)
        .unwrap()
    else {
        panic!("first activation should create a row");
    };

    let mut again = request(license.id, "hw-A");
    again.version = "1.1.0".into();
    let later = first_at + Duration::hours(1);
    let outcome = store
        .activate(&again, license.max_activations, later)
        .unwrap();

    let ActivationOutcome::Refreshed(refreshed) = outcome else {
        panic!("expected refresh, got {outcome:?}");
    };
    assert_eq!(refreshed.id, first.id);
    assert_eq!(refreshed.version, "1.1.0");
    assert_eq!(refreshed.activated_at, later);
    assert_eq!(store.count_active(license.id).unwrap(), 1);
    assert_eq!(store.find_active(license.id, "hw-A").unwrap(), Some(refreshed));
}

#[test]
fn limit_is_enforced() {
    let (store, license) = store_with(Tier::Trial);
    for hw in ["hw-A", "hw-B"] {
        let outcome = store
            .activate(&request(license.id, hw), license.max_activations, now())
            .unwrap();
        assert!(matches!(outcome, ActivationOutcome::Created(_)));
    }

    let outcome = store
        .activate(&request(license.id, "hw-C"), license.max_activations, now())
        .unwrap();
    assert_eq!(outcome, ActivationOutcome::LimitReached { active: 2 });
    assert!(store.find_active(license.id, "hw-C").unwrap().is_none());
}

#[test]
fn deactivation_frees_a_slot() {
    let (store, license) = store_with(Tier::Community);
    store
        .activate(&request(license.id, "hw-A"), license.max_activations, now())
        .unwrap();

    let closed = store.deactivate(license.id, "hw-A", now()).unwrap().unwrap();
    assert!(!closed.is_active());
    assert_eq!(store.count_active(license.id).unwrap(), 0);

    let outcome = store
        .activate(&request(license.id, "hw-B"), license.max_activations, now())
        .unwrap();
    assert!(matches!(outcome, ActivationOutcome::Created(_)));
}

#[test]
fn deactivate_unknown_is_noop() {
    let (store, license) = store_with(Tier::Pro);
    assert!(store.deactivate(license.id, "hw-Z", now()).unwrap().is_none());
}

#[test]
fn history_is_kept_after_deactivation() {
    let (store, license) = store_with(Tier::Community);
    store
        .activate(&request(license.id, "hw-A"), license.max_activations, now())
        .unwrap();
    store.deactivate(license.id, "hw-A", now()).unwrap();
    store
        .activate(&request(license.id, "hw-A"), license.max_activations, now())
        .unwrap();

    let history = store.activations(license.id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|a| a.is_active()).count(), 1);
}

#[test]
fn unbounded_never_limits() {
    let (store, license) = store_with(Tier::Enterprise);
    for i in 0..50 {
        let outcome = store
            .activate(&request(license.id, &format!("hw-{i}")), Limit::Unbounded, now())
            .unwrap();
        assert!(matches!(outcome, ActivationOutcome::Created(_)));
    }
    assert_eq!(store.count_active(license.id).unwrap(), 50);
}

#[test]
fn concurrent_activations_respect_cap() {
    let (store, license) = store_with(Tier::Pro);
    let limit = license.max_activations;
    let cap = limit.get().unwrap() as usize;
    let store = Arc::new(store);
    let barrier = Arc::new(Barrier::new(cap + 1));

    let handles: Vec<_> = (0..=cap)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let license_id = license.id;
            thread::spawn(move || {
                barrier.wait();
                store
                    .activate(&request(license_id, &format!("hw-{i}")), limit, now())
                    .unwrap()
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let created = outcomes
        .iter()
        .filter(|o| matches!(o, ActivationOutcome::Created(_)))
        .count();
    assert_eq!(created, cap);
    assert_eq!(store.count_active(license.id).unwrap() as usize, cap);
}

#[test]
fn separate_connections_respect_cap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let license = license_for(OwnerId::new(), Tier::Trial);
    SqliteStore::open(&path)
        .unwrap()
        .insert_license(NewLicense {
            license: &license,
            supersede: None,
            initial_activation: None,
        })
        .unwrap();

    let limit = license.max_activations;
    let attempts = 6;
    let barrier = Arc::new(Barrier::new(attempts));
    let handles: Vec<_> = (0..attempts)
        .map(|i| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            let license_id = license.id;
            thread::spawn(move || {
                let store = SqliteStore::open(&path).unwrap();
                barrier.wait();
                store
                    .activate(&request(license_id, &format!("hw-{i}")), limit, now())
                    .unwrap()
            })
        })
        .collect();

    let created = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|o| matches!(o, ActivationOutcome::Created(_)))
        .count();
    assert_eq!(created, 2);
    assert_eq!(SqliteStore::open(&path).unwrap().count_active(license.id).unwrap(), 2);
}
