use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use table_lock::{
    Cancellation, Expiry, InMemoryTable, LockConfig, LockError, LockKey, LockRecord, LockStore,
    OwnerId, Timeout,
};

use crate::support::{coordinator, ms};

#[test]
fn wait_timeout_is_bounded() {
    let coordinator = coordinator();
    let key = LockKey::new("jobs", "nightly").unwrap();
    coordinator
        .store()
        .insert_if_absent(&key, LockRecord::new(OwnerId::generate(), Expiry::Never))
        .unwrap();

    let table: InMemoryTable<&str, ()> = InMemoryTable::new("jobs");
    let config = LockConfig::default()
        .wait_timeout(Timeout::millis(100))
        .spin_delay(ms(2));

    let started = Instant::now();
    let err = coordinator
        .with_lock_config(&table, &"nightly", |_, _| (), &config)
        .unwrap_err();
    let elapsed = started.elapsed();

    match err {
        LockError::WaitTimeout { waited, .. } => assert!(waited >= ms(100)),
        other => panic!("expected WaitTimeout, got {:?}", other),
    }
    assert!(elapsed >= ms(100));
    // 100ms budget + one spin, plus scheduler slack.
    assert!(elapsed < ms(100 + 2 + 100), "waited {:?}", elapsed);
}

#[test]
fn exec_timeout_releases_for_the_next_caller() {
    let coordinator = coordinator();
    let table: InMemoryTable<&str, ()> = InMemoryTable::new("jobs");
    let slow = LockConfig::default()
        .spin_delay(ms(1))
        .exec_timeout(Timeout::millis(50));

    let started = Instant::now();
    let err = coordinator
        .with_lock_config(&table, &"report", |_, _| thread::sleep(ms(300)), &slow)
        .unwrap_err();
    assert!(matches!(err, LockError::ExecTimeout { .. }));
    assert!(started.elapsed() < ms(250));

    // The first callback is still sleeping, but its lock is gone.
    let prompt = LockConfig::default()
        .spin_delay(ms(1))
        .wait_timeout(Timeout::millis(20));
    let value = coordinator
        .with_lock_config(&table, &"report", |_, _| 5, &prompt)
        .unwrap();
    assert_eq!(value, 5);
}

#[test]
fn exec_timeout_cancels_cooperative_callbacks() {
    let coordinator = coordinator();
    let table: InMemoryTable<&str, ()> = InMemoryTable::new("jobs");
    let config = LockConfig::default()
        .spin_delay(ms(1))
        .exec_timeout(Timeout::millis(30));
    let finished_work = Arc::new(AtomicBool::new(false));
    let flag = finished_work.clone();

    let work = move |_, cancel: Cancellation| {
        for _ in 0..200 {
            if cancel.is_cancelled() {
                return;
            }
            thread::sleep(ms(1));
        }
        flag.store(true, Ordering::SeqCst);
    };
    let err = coordinator
        .with_lock_config(&table, &"batch", work, &config)
        .unwrap_err();

    assert!(matches!(err, LockError::ExecTimeout { .. }));
    thread::sleep(ms(250));
    assert!(!finished_work.load(Ordering::SeqCst));
}

#[test]
fn infinite_wait_eventually_acquires() {
    let coordinator = coordinator();
    let table: InMemoryTable<&str, ()> = InMemoryTable::new("jobs");
    let key = LockKey::new("jobs", "queue").unwrap();
    let record = LockRecord::new(OwnerId::generate(), Expiry::Never);
    coordinator.store().insert_if_absent(&key, record).unwrap();

    let releaser = {
        let coordinator = coordinator.clone();
        let key = key.clone();
        thread::spawn(move || {
            thread::sleep(ms(50));
            coordinator.release(&key, &record).unwrap()
        })
    };

    let config = coordinator.config().clone().wait_timeout(Timeout::Infinite);
    let value = coordinator
        .with_lock_config(&table, &"queue", |_, _| "mine", &config)
        .unwrap();
    assert_eq!(value, "mine");
    assert!(releaser.join().unwrap());
}
