//! The data a lock protects.
//!
//! A [`Table`] names a lock domain and hands the coordinator the entries
//! stored under a key, which become the callback's input once the lock is
//! held. The coordinator only reads through this trait; writes are up to
//! the callback.

mod in_memory;

pub use in_memory::InMemoryTable;

use serde::Serialize;

use crate::error::LockError;

pub trait Table: Send + Sync {
    type Key: Serialize;
    type Entry: Send + 'static;

    /// The lock domain. Two tables with the same name share locks.
    fn name(&self) -> &str;

    /// Everything stored under `key`, possibly empty.
    fn entries(&self, key: &Self::Key) -> Result<Vec<Self::Entry>, LockError>;
}
