use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use super::{LockKey, LockRecord, LockStore};
use crate::error::LockError;

/// Process-local lock store backed by an `Arc<RwLock<HashMap<..>>>`.
///
/// Cloning returns another handle to the same records, so one store can be
/// handed to many threads and coordinators.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockStore {
    records: Arc<RwLock<HashMap<LockKey, LockRecord>>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        InMemoryLockStore {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The process-wide default store, created on first use.
    ///
    /// Only the `Default` coordinator and the free
    /// [`with_lock`](crate::with_lock) use it; everything else takes an
    /// explicit store.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<InMemoryLockStore> = OnceLock::new();
        GLOBAL.get_or_init(InMemoryLockStore::new).clone()
    }

    /// Drop every record that has expired as of `now_millis`.
    /// Returns the number removed.
    pub fn purge_expired(&self, now_millis: u64) -> Result<usize, LockError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LockError::Store("purge_expired"))?;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now_millis));
        Ok(before - records.len())
    }

    pub fn len(&self) -> Result<usize, LockError> {
        let records = self
            .records
            .read()
            .map_err(|_| LockError::Store("len"))?;
        Ok(records.len())
    }

    pub fn is_empty(&self) -> Result<bool, LockError> {
        Ok(self.len()? == 0)
    }
}

impl LockStore for InMemoryLockStore {
    fn insert_if_absent(&self, key: &LockKey, record: LockRecord) -> Result<bool, LockError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LockError::Store("insert_if_absent"))?;
        if records.contains_key(key) {
            return Ok(false);
        }
        records.insert(key.clone(), record);
        Ok(true)
    }

    fn remove_if_equal(&self, key: &LockKey, record: &LockRecord) -> Result<bool, LockError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LockError::Store("remove_if_equal"))?;
        if records.get(key) == Some(record) {
            records.remove(key);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn lookup(&self, key: &LockKey) -> Result<Option<LockRecord>, LockError> {
        let records = self
            .records
            .read()
            .map_err(|_| LockError::Store("lookup"))?;
        Ok(records.get(key).copied())
    }

    fn delete(&self, key: &LockKey) -> Result<bool, LockError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LockError::Store("delete"))?;
        Ok(records.remove(key).is_some())
    }
}
