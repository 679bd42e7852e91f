use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use tts_quota_gate::limits::StaticLimitsProvider;
use tts_quota_gate::storage::{MemoryUsageStore, SqliteUsageStore};
use tts_quota_gate::{ConfigCache, LimitValues, QuotaGate, QuotaPolicy, Tier, UsageStore};

fn gate_with(store: Arc<dyn UsageStore>) -> QuotaGate {
    let limits = LimitValues::default();
    let cache = Arc::new(ConfigCache::new(
        limits,
        Arc::new(StaticLimitsProvider::new(limits)),
    ));
    QuotaGate::new(cache, store, QuotaPolicy::default())
}

/// Runs two same-device charges of 1200 against a 2000 daily limit at once and
/// returns how many were allowed.
fn race_pair(first: &QuotaGate, second: &QuotaGate, device_id: &str) -> usize {
    let now = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [first.clone(), second.clone()]
        .into_iter()
        .map(|gate| {
            let barrier = Arc::clone(&barrier);
            let device_id = device_id.to_string();
            thread::spawn(move || {
                barrier.wait();
                gate.check_and_charge(&device_id, 1_200, Tier::Free, now)
                    .expect("store must not fail")
                    .is_allowed()
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().expect("charging thread panicked"))
        .filter(|allowed| *allowed)
        .count()
}

#[test]
fn test_memory_store_allows_exactly_one_of_two_racing_charges() {
    let store = Arc::new(MemoryUsageStore::new());
    let gate = gate_with(store.clone());

    for round in 0..50 {
        let device_id = format!("device-{round}");
        assert_eq!(race_pair(&gate, &gate, &device_id), 1, "round {round}");
        assert_eq!(store.get(&device_id).unwrap().day_used, 1_200);
    }
}

#[test]
fn test_sqlite_store_allows_exactly_one_of_two_racing_charges() {
    let temp = tempdir().unwrap();
    let store: Arc<dyn UsageStore> = Arc::new(
        SqliteUsageStore::new(temp.path().to_path_buf(), Duration::from_secs(5)).unwrap(),
    );
    let gate = gate_with(Arc::clone(&store));

    for round in 0..20 {
        let device_id = format!("device-{round}");
        assert_eq!(race_pair(&gate, &gate, &device_id), 1, "round {round}");
        assert_eq!(store.get(&device_id).unwrap().day_used, 1_200);
    }
}

#[test]
fn test_separate_sqlite_connections_share_the_write_lock() {
    let temp = tempdir().unwrap();
    let first: Arc<dyn UsageStore> = Arc::new(
        SqliteUsageStore::new(temp.path().to_path_buf(), Duration::from_secs(5)).unwrap(),
    );
    let second: Arc<dyn UsageStore> = Arc::new(
        SqliteUsageStore::new(temp.path().to_path_buf(), Duration::from_secs(5)).unwrap(),
    );
    let gate_a = gate_with(Arc::clone(&first));
    let gate_b = gate_with(Arc::clone(&second));

    for round in 0..20 {
        let device_id = format!("device-{round}");
        assert_eq!(race_pair(&gate_a, &gate_b, &device_id), 1, "round {round}");
        assert_eq!(first.get(&device_id).unwrap().day_used, 1_200);
    }
}

#[test]
fn test_different_devices_do_not_contend() {
    let store = Arc::new(MemoryUsageStore::new());
    let gate = gate_with(store.clone());
    let now = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let gate = gate.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                gate.check_and_charge(&format!("device-{i}"), 2_000, Tier::Free, now)
                    .unwrap()
                    .is_allowed()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(store.len(), 8);
}
