use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::LockError;

/// Identity of a lockable resource: a domain (usually a table name) plus
/// the encoded key of the entity inside it.
///
/// Both parts take part in equality, so the same key in two domains maps
/// to two independent locks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockKey {
    domain: String,
    key: Vec<u8>,
}

impl LockKey {
    /// Build a lock key from any serializable key value.
    ///
    /// The key is stored as its `bitcode` encoding, so values that encode
    /// identically (`"a"` and `String::from("a")`) address the same lock.
    pub fn new<K: Serialize + ?Sized>(
        domain: impl Into<String>,
        key: &K,
    ) -> Result<Self, LockError> {
        let key =
            bitcode::serialize(&key).map_err(|e| LockError::InvalidKey(e.to_string()))?;
        Ok(LockKey {
            domain: domain.into(),
            key,
        })
    }

    /// Build a lock key from already-encoded key bytes.
    pub fn from_bytes(domain: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        LockKey {
            domain: domain.into(),
            key: key.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn key_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, URL_SAFE_NO_PAD.encode(&self.key))
    }
}
