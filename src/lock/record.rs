use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the call that wrote a lock record.
///
/// A fresh id is generated for every acquisition; it only matters for
/// equality when a record is conditionally removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn generate() -> Self {
        OwnerId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// When a lock record stops protecting its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expiry {
    /// Milliseconds timestamp from the coordinator's clock.
    At(u64),
    Never,
}

impl Expiry {
    pub fn is_expired(&self, now_millis: u64) -> bool {
        match self {
            Expiry::At(deadline) => now_millis >= *deadline,
            Expiry::Never => false,
        }
    }
}

impl From<Option<u64>> for Expiry {
    fn from(deadline: Option<u64>) -> Self {
        deadline.map_or(Expiry::Never, Expiry::At)
    }
}

/// The value stored under a [`LockKey`](super::LockKey) while it is held.
///
/// Records are never mutated. Releasing or reclaiming one removes it only
/// if the stored value still equals the record the remover observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockRecord {
    pub owner: OwnerId,
    pub expires_at: Expiry,
}

impl LockRecord {
    pub fn new(owner: OwnerId, expires_at: Expiry) -> Self {
        LockRecord { owner, expires_at }
    }

    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.expires_at.is_expired(now_millis)
    }
}
