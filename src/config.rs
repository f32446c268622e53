use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{millis_ceil, millis_of};
use crate::error::LockError;

/// A bound on how long something may take, or no bound at all.
///
/// Serialized as a millisecond count, or the string `"infinity"`. The
/// serialized form has millisecond granularity: a partial millisecond is
/// rounded up, so a non-zero bound never serializes as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TimeoutRepr", into = "TimeoutRepr")]
pub enum Timeout {
    After(Duration),
    Infinite,
}

impl Timeout {
    pub fn millis(ms: u64) -> Self {
        Timeout::After(Duration::from_millis(ms))
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Timeout::Infinite)
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Timeout::After(d) => Some(*d),
            Timeout::Infinite => None,
        }
    }

    /// Absolute deadline in milliseconds, `None` when unbounded.
    pub fn deadline_from(&self, now_millis: u64) -> Option<u64> {
        self.as_duration()
            .map(|d| now_millis.saturating_add(millis_of(d)))
    }

    /// Sum of two bounds; infinite if either side is.
    pub fn plus(self, other: Timeout) -> Timeout {
        match (self, other) {
            (Timeout::After(a), Timeout::After(b)) => Timeout::After(a.saturating_add(b)),
            _ => Timeout::Infinite,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::After(d)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TimeoutRepr {
    Millis(u64),
    Keyword(String),
}

impl TryFrom<TimeoutRepr> for Timeout {
    type Error = String;

    fn try_from(repr: TimeoutRepr) -> Result<Self, Self::Error> {
        match repr {
            TimeoutRepr::Millis(ms) => Ok(Timeout::millis(ms)),
            TimeoutRepr::Keyword(word) => match word.as_str() {
                "infinity" | "infinite" => Ok(Timeout::Infinite),
                other => Err(format!("unknown timeout {:?}", other)),
            },
        }
    }
}

impl From<Timeout> for TimeoutRepr {
    fn from(timeout: Timeout) -> Self {
        match timeout {
            Timeout::After(d) => TimeoutRepr::Millis(millis_ceil(d)),
            Timeout::Infinite => TimeoutRepr::Keyword("infinity".into()),
        }
    }
}

/// Bounds applied to one `with_lock` call.
///
/// ```
/// use table_lock::{LockConfig, Timeout};
/// use std::time::Duration;
///
/// let config = LockConfig::default()
///     .wait_timeout(Timeout::millis(150))
///     .spin_delay(Duration::from_millis(1));
/// assert_eq!(config.lease(), Timeout::millis(6_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// How long to keep trying to acquire.
    pub wait_timeout: Timeout,
    /// How long the callback may run once the lock is held.
    pub exec_timeout: Timeout,
    /// Grace after `exec_timeout` before the record counts as abandoned.
    pub fail_timeout: Timeout,
    /// Sleep between failed acquisition attempts.
    #[serde(with = "millis")]
    pub spin_delay: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Timeout::millis(5_000),
            exec_timeout: Timeout::millis(5_000),
            fail_timeout: Timeout::millis(1_000),
            spin_delay: Duration::from_millis(2),
        }
    }
}

impl LockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.wait_timeout = timeout.into();
        self
    }

    pub fn exec_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.exec_timeout = timeout.into();
        self
    }

    pub fn fail_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.fail_timeout = timeout.into();
        self
    }

    pub fn spin_delay(mut self, delay: Duration) -> Self {
        self.spin_delay = delay;
        self
    }

    /// Lifetime of a freshly written lock record: `exec_timeout + fail_timeout`.
    pub fn lease(&self) -> Timeout {
        self.exec_timeout.plus(self.fail_timeout)
    }

    /// Parse a JSON object. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, LockError> {
        serde_json::from_str(json).map_err(|e| LockError::Config(e.to_string()))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    use crate::clock::millis_ceil;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(millis_ceil(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
