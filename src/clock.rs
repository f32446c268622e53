//! Millisecond clocks used to stamp and judge lock leases.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of millisecond timestamps.
///
/// Timestamps must never go backwards for a given clock, otherwise a lease
/// could appear to un-expire.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall-clock milliseconds since the Unix epoch, made monotonic by
/// anchoring one wall-clock reading to an `Instant` on first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        SystemClock
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub(crate) fn millis_of(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Like [`millis_of`] but a partial millisecond counts as a whole one.
pub(crate) fn millis_ceil(d: Duration) -> u64 {
    let whole = millis_of(d);
    if d > Duration::from_millis(whole) {
        whole.saturating_add(1)
    } else {
        whole
    }
}

fn anchor() -> &'static (Instant, u64) {
    static ANCHOR: OnceLock<(Instant, u64)> = OnceLock::new();
    ANCHOR.get_or_init(|| {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(millis_of)
            .unwrap_or(0);
        (Instant::now(), wall)
    })
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        let (instant, wall) = anchor();
        wall.saturating_add(millis_of(instant.elapsed()))
    }
}

/// A clock that only moves when told to. Cloning shares the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        ManualClock {
            now: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = millis_of(by);
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(by))
            });
    }

    /// Jump to `millis`. Ignored if it would move the clock backwards.
    pub fn set(&self, millis: u64) {
        self.now.fetch_max(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
