use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use super::Table;
use crate::error::LockError;

/// A named multi-value table: each key maps to a list of entries.
///
/// Cloning returns another handle to the same storage, so a clone can be
/// moved into a lock callback and written from there.
#[derive(Debug)]
pub struct InMemoryTable<K, V> {
    name: Arc<str>,
    storage: Arc<RwLock<HashMap<K, Vec<V>>>>,
}

impl<K, V> Clone for InMemoryTable<K, V> {
    fn clone(&self) -> Self {
        InMemoryTable {
            name: Arc::clone(&self.name),
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<K: Eq + Hash, V: Clone> InMemoryTable<K, V> {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        InMemoryTable {
            name: name.into(),
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Append `value` to the entries under `key`.
    pub fn insert(&self, key: K, value: V) -> Result<(), LockError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| LockError::Table("table poisoned during insert".into()))?;
        storage.entry(key).or_default().push(value);
        Ok(())
    }

    /// Replace the entries under `key`.
    pub fn replace(&self, key: K, values: Vec<V>) -> Result<(), LockError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| LockError::Table("table poisoned during replace".into()))?;
        storage.insert(key, values);
        Ok(())
    }

    /// Remove and return the entries under `key`.
    pub fn remove(&self, key: &K) -> Result<Vec<V>, LockError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| LockError::Table("table poisoned during remove".into()))?;
        Ok(storage.remove(key).unwrap_or_default())
    }

    pub fn get(&self, key: &K) -> Result<Vec<V>, LockError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| LockError::Table("table poisoned during read".into()))?;
        Ok(storage.get(key).cloned().unwrap_or_default())
    }
}

impl<K, V> Table for InMemoryTable<K, V>
where
    K: Eq + Hash + Serialize + Send + Sync,
    V: Clone + Send + Sync + 'static,
{
    type Key = K;
    type Entry = V;

    fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self, key: &K) -> Result<Vec<V>, LockError> {
        self.get(key)
    }
}
