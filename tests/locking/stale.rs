use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use table_lock::{
    Clock, Expiry, InMemoryTable, LockConfig, LockKey, LockRecord, LockStore, OwnerId,
    SystemClock, Timeout,
};

use crate::support::{coordinator, ms};

#[test]
fn crashed_owner_is_reclaimed_after_its_lease() {
    let coordinator = coordinator();
    let table: InMemoryTable<&str, ()> = InMemoryTable::new("accounts");
    let key = LockKey::new("accounts", "alice").unwrap();

    // A holder that died without releasing: its record just sits there.
    let expires_at = SystemClock.now_millis() + 150;
    let orphan = LockRecord::new(OwnerId::generate(), Expiry::At(expires_at));
    coordinator.store().insert_if_absent(&key, orphan).unwrap();

    let impatient = LockConfig::default()
        .spin_delay(ms(1))
        .wait_timeout(Timeout::millis(50));
    let early = coordinator.with_lock_config(&table, &"alice", |_, _| (), &impatient);
    assert!(early.unwrap_err().is_timeout());

    let patient = impatient.clone().wait_timeout(Timeout::millis(1_000));
    let started = Instant::now();
    coordinator
        .with_lock_config(&table, &"alice", |_, _| (), &patient)
        .unwrap();

    assert!(SystemClock.now_millis() >= expires_at);
    assert!(started.elapsed() < ms(1_000));
    assert!(coordinator.store().lookup(&key).unwrap().is_none());
}

#[test]
fn infinite_fail_timeout_never_goes_stale() {
    let coordinator = coordinator();
    let table: InMemoryTable<&str, ()> = InMemoryTable::new("accounts");
    let key = LockKey::new("accounts", "bob").unwrap();
    let orphan = LockRecord::new(OwnerId::generate(), Expiry::Never);
    coordinator.store().insert_if_absent(&key, orphan).unwrap();

    let config = LockConfig::default()
        .spin_delay(ms(1))
        .wait_timeout(Timeout::millis(80));
    let result = coordinator.with_lock_config(&table, &"bob", |_, _| (), &config);

    assert!(result.unwrap_err().is_timeout());
    assert_eq!(coordinator.store().lookup(&key).unwrap(), Some(orphan));
}

#[test]
fn panicking_callback_releases_and_propagates() {
    let coordinator = coordinator();
    let table: InMemoryTable<&str, ()> = InMemoryTable::new("accounts");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        coordinator.with_lock(&table, &"carol", |_, _| -> () { panic!("callback failed") })
    }));

    let payload = outcome.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"callback failed"));
    assert!(!coordinator.is_locked("accounts", "carol").unwrap());
}
