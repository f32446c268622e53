use std::thread;

use table_lock::{InMemoryTable, LockConfig, Timeout};

use crate::support::{coordinator, ms};

/// A takes the lock first and writes after 100ms; B arrives 50ms later,
/// spins until A releases, and only writes into an empty slot.
#[test]
fn second_contender_sees_first_write() {
    let coordinator = coordinator();
    let table: InMemoryTable<&str, &str> = InMemoryTable::new("answers");

    let a = {
        let coordinator = coordinator.clone();
        let table = table.clone();
        thread::spawn(move || {
            let writer = table.clone();
            coordinator.with_lock(&table, &"K", move |_, _| {
                thread::sleep(ms(100));
                writer.insert("K", "yup").unwrap();
            })
        })
    };

    thread::sleep(ms(50));

    let config = LockConfig::default()
        .spin_delay(ms(2))
        .wait_timeout(Timeout::millis(150));
    let writer = table.clone();
    let write_if_empty = move |entries: Vec<&'static str>, _| {
        if entries.is_empty() {
            writer.insert("K", "nope").unwrap();
        }
        entries
    };
    let observed = coordinator
        .with_lock_config(&table, &"K", write_if_empty, &config)
        .unwrap();

    a.join().unwrap().unwrap();
    assert_eq!(observed, vec!["yup"]);
    assert_eq!(table.get(&"K").unwrap(), vec!["yup"]);
}

#[test]
fn global_store_entry_point() {
    let table: InMemoryTable<&str, u8> = InMemoryTable::new("global-entry-point");
    table.insert("k", 1).unwrap();

    let sum: u8 = table_lock::with_lock(&table, &"k", |entries, _| entries.iter().sum()).unwrap();
    assert_eq!(sum, 1);
}
