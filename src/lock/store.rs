use super::{LockKey, LockRecord};
use crate::error::LockError;

/// Shared table of lock records.
///
/// Every method must be atomic with respect to every other caller, and all
/// operations on one key must be totally ordered. Mutual exclusion rests
/// entirely on `insert_if_absent` and `remove_if_equal`; the coordinator
/// holds no other shared state.
///
/// The default [`InMemoryLockStore`](super::InMemoryLockStore) keeps records
/// in a process-local map; other implementations might back onto any store
/// offering compare-and-set on a key.
pub trait LockStore: Send + Sync {
    /// Store `record` under `key` if no record is present.
    /// Returns `Ok(true)` if this call created the mapping.
    fn insert_if_absent(&self, key: &LockKey, record: LockRecord) -> Result<bool, LockError>;

    /// Remove the record under `key` only if it equals `record`.
    /// Returns `Ok(true)` if it was removed, `Ok(false)` if it was absent or
    /// had been replaced.
    fn remove_if_equal(&self, key: &LockKey, record: &LockRecord) -> Result<bool, LockError>;

    fn lookup(&self, key: &LockKey) -> Result<Option<LockRecord>, LockError>;

    /// Remove whatever is stored under `key`. Bypasses the ownership check;
    /// administrative use only.
    fn delete(&self, key: &LockKey) -> Result<bool, LockError>;
}
