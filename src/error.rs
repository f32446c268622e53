use std::fmt;
use std::time::Duration;

/// Errors surfaced by [`LockCoordinator`](crate::LockCoordinator) and the
/// stores and tables it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The lock could not be acquired before the wait timeout elapsed.
    WaitTimeout { key: String, waited: Duration },
    /// The lock was acquired but the callback overran its budget.
    /// The lock record has already been released when this is returned.
    ExecTimeout { key: String, timeout: Duration },
    /// The lock store failed (e.g. a poisoned in-memory table).
    Store(&'static str),
    /// Reading the protected entries failed.
    Table(String),
    /// The worker thread for the callback could not be started.
    Spawn(String),
    /// The key could not be encoded into a lock key.
    InvalidKey(String),
    /// Configuration could not be parsed.
    Config(String),
}

impl LockError {
    /// True for the two timeout outcomes, which callers usually retry.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            LockError::WaitTimeout { .. } | LockError::ExecTimeout { .. }
        )
    }
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::WaitTimeout { key, waited } => {
                write!(f, "timed out after {:?} waiting for lock {}", waited, key)
            }
            LockError::ExecTimeout { key, timeout } => write!(
                f,
                "callback holding lock {} exceeded its {:?} budget",
                key, timeout
            ),
            LockError::Store(operation) => {
                write!(f, "lock store poisoned during {}", operation)
            }
            LockError::Table(msg) => write!(f, "failed to read entries: {}", msg),
            LockError::Spawn(msg) => write!(f, "failed to spawn lock worker: {}", msg),
            LockError::InvalidKey(msg) => write!(f, "invalid lock key: {}", msg),
            LockError::Config(msg) => write!(f, "invalid lock config: {}", msg),
        }
    }
}

impl std::error::Error for LockError {}
