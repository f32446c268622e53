//! Advisory, per-key exclusive locks over entries in a shared table.
//!
//! Locks live as records in a [`LockStore`]; a caller holds a key when its
//! conditional insert succeeds. There is no lock server. Abandoned records
//! expire after a lease and are reclaimed by the next contender, and the
//! protected callback runs under a time budget after which the lock is
//! released regardless.
//!
//! ```
//! use table_lock::{InMemoryLockStore, InMemoryTable, LockConfig, LockCoordinator, Timeout};
//!
//! let coordinator = LockCoordinator::new(InMemoryLockStore::new())
//!     .with_config(LockConfig::default().wait_timeout(Timeout::millis(150)));
//! let inventory = InMemoryTable::new("inventory");
//!
//! let writer = inventory.clone();
//! coordinator
//!     .with_lock(&inventory, &"widget", move |stock, _cancel| {
//!         if stock.is_empty() {
//!             writer.insert("widget", 3).unwrap();
//!         }
//!     })
//!     .unwrap();
//! assert_eq!(inventory.get(&"widget").unwrap(), vec![3]);
//! ```

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod table;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LockConfig, Timeout};
pub use coordinator::{Cancellation, LockCoordinator};
pub use error::LockError;
pub use lock::{Expiry, InMemoryLockStore, LockKey, LockRecord, LockStore, OwnerId};
pub use table::{InMemoryTable, Table};

/// Run `callback` under the lock for `(table.name(), key)` using the
/// process-wide default store and default config.
pub fn with_lock<T, F, R>(table: &T, key: &T::Key, callback: F) -> Result<R, LockError>
where
    T: Table,
    F: FnOnce(Vec<T::Entry>, Cancellation) -> R + Send + 'static,
    R: Send + 'static,
{
    let coordinator: LockCoordinator = LockCoordinator::default();
    coordinator.with_lock(table, key, callback)
}

/// Like [`with_lock`] with an explicit config.
pub fn with_lock_config<T, F, R>(
    table: &T,
    key: &T::Key,
    callback: F,
    config: &LockConfig,
) -> Result<R, LockError>
where
    T: Table,
    F: FnOnce(Vec<T::Entry>, Cancellation) -> R + Send + 'static,
    R: Send + 'static,
{
    let coordinator: LockCoordinator = LockCoordinator::default();
    coordinator.with_lock_config(table, key, callback, config)
}
