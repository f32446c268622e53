//! The lock coordinator: acquisition, stale-lock reclamation, time-boxed
//! execution and release.

mod exec;
#[cfg(feature = "tokio")]
mod task;

pub use exec::Cancellation;

use std::panic;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::LockConfig;
use crate::error::LockError;
use crate::lock::{InMemoryLockStore, LockKey, LockRecord, LockStore, OwnerId};
use crate::table::Table;
use exec::Finished;

/// Runs callbacks under per-key exclusive locks kept in a [`LockStore`].
///
/// There is no lock server: every caller races on the store's conditional
/// insert, and whoever creates the record holds the lock. Records carry a
/// lease of `exec_timeout + fail_timeout`, after which any contender may
/// remove them, so a crashed owner cannot block a key forever unless the
/// lease is infinite.
///
/// Waiting is a poll loop that sleeps `spin_delay` between attempts. Nothing
/// wakes a waiter when the lock is released, which keeps the store the only
/// shared state at the cost of up to one `spin_delay` of extra latency.
/// Waiters are not queued: when several are spinning, any of them may win.
///
/// ```
/// use table_lock::{InMemoryLockStore, InMemoryTable, LockCoordinator};
///
/// let coordinator = LockCoordinator::new(InMemoryLockStore::new());
/// let accounts = InMemoryTable::new("accounts");
/// accounts.insert("alice", 10).unwrap();
///
/// let writer = accounts.clone();
/// let total = coordinator
///     .with_lock(&accounts, &"alice", move |balances, _cancel| {
///         let total: i32 = balances.iter().sum::<i32>() + 5;
///         writer.replace("alice", vec![total]).unwrap();
///         total
///     })
///     .unwrap();
/// assert_eq!(total, 15);
/// ```
#[derive(Debug, Clone)]
pub struct LockCoordinator<S = InMemoryLockStore, C = SystemClock> {
    store: S,
    clock: C,
    config: LockConfig,
}

/// Result of one pass through the acquisition loop.
enum Attempt {
    Acquired(LockRecord),
    Busy,
    Reclaimed,
    TimedOut(Duration),
}

/// An acquired lock. Dropping it releases the record, including while
/// unwinding or when an async caller is dropped mid-run.
struct HeldLock<'a, S: LockStore, C: Clock> {
    coordinator: &'a LockCoordinator<S, C>,
    key: &'a LockKey,
    record: LockRecord,
}

impl<S: LockStore, C: Clock> Drop for HeldLock<'_, S, C> {
    fn drop(&mut self) {
        self.coordinator.release_quietly(self.key, &self.record);
    }
}

impl Default for LockCoordinator {
    /// A coordinator over [`InMemoryLockStore::global`] with default config.
    fn default() -> Self {
        LockCoordinator::new(InMemoryLockStore::global())
    }
}

impl<S: LockStore> LockCoordinator<S, SystemClock> {
    pub fn new(store: S) -> Self {
        LockCoordinator {
            store,
            clock: SystemClock,
            config: LockConfig::default(),
        }
    }
}

impl<S: LockStore, C: Clock> LockCoordinator<S, C> {
    /// Replace the clock used to stamp and judge leases.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> LockCoordinator<S, C2> {
        LockCoordinator {
            store: self.store,
            clock,
            config: self.config,
        }
    }

    pub fn with_config(mut self, config: LockConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run `callback` on the entries stored under `key` while holding the
    /// lock for `(table.name(), key)`, using this coordinator's config.
    ///
    /// See [`with_lock_config`](Self::with_lock_config).
    pub fn with_lock<T, F, R>(&self, table: &T, key: &T::Key, callback: F) -> Result<R, LockError>
    where
        T: Table,
        F: FnOnce(Vec<T::Entry>, Cancellation) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.with_lock_config(table, key, callback, &self.config)
    }

    /// Run `callback` under the lock with an explicit config.
    ///
    /// The callback runs on a separate thread. Once the lock is acquired it
    /// is released on every exit path before this returns.
    ///
    /// # Errors
    ///
    /// - [`LockError::WaitTimeout`] if the lock was not acquired within
    ///   `wait_timeout`.
    /// - [`LockError::ExecTimeout`] if the callback overran `exec_timeout`.
    ///   Its [`Cancellation`] has been tripped and the lock released.
    /// - [`LockError::Store`], [`LockError::Table`] or [`LockError::Spawn`]
    ///   on infrastructure failures.
    ///
    /// # Panics
    ///
    /// A panic inside the callback is resumed on the calling thread after
    /// the lock is released.
    pub fn with_lock_config<T, F, R>(
        &self,
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
        let lock_key = LockKey::new(table.name(), key)?;
        let held = self.hold(&lock_key, self.acquire(&lock_key, config)?);

        let outcome = table.entries(key).and_then(|entries| {
            exec::run_with_timeout(&lock_key, entries, callback, config.exec_timeout)
        });

        drop(held);
        self.finish(&lock_key, outcome, config)
    }

    /// The live record holding `(domain, key)`, if any.
    pub fn holder<K: Serialize + ?Sized>(
        &self,
        domain: &str,
        key: &K,
    ) -> Result<Option<LockRecord>, LockError> {
        let lock_key = LockKey::new(domain, key)?;
        let now = self.clock.now_millis();
        Ok(self
            .store
            .lookup(&lock_key)?
            .filter(|record| !record.is_expired(now)))
    }

    pub fn is_locked<K: Serialize + ?Sized>(
        &self,
        domain: &str,
        key: &K,
    ) -> Result<bool, LockError> {
        Ok(self.holder(domain, key)?.is_some())
    }

    /// Remove `record` from `key` if it is still the stored record.
    ///
    /// Returns `Ok(false)` when the record was already released or
    /// reclaimed, so releasing twice is harmless.
    pub fn release(&self, key: &LockKey, record: &LockRecord) -> Result<bool, LockError> {
        let released = self.store.remove_if_equal(key, record)?;
        if released {
            debug!(lock = %key, owner = %record.owner, "released lock");
        } else {
            debug!(lock = %key, owner = %record.owner, "lock already gone at release");
        }
        Ok(released)
    }

    fn release_quietly(&self, key: &LockKey, record: &LockRecord) {
        if let Err(e) = self.release(key, record) {
            warn!(lock = %key, owner = %record.owner, error = %e, "failed to release lock");
        }
    }

    fn hold<'a>(&'a self, key: &'a LockKey, record: LockRecord) -> HeldLock<'a, S, C> {
        HeldLock {
            coordinator: self,
            key,
            record,
        }
    }

    fn acquire(&self, key: &LockKey, config: &LockConfig) -> Result<LockRecord, LockError> {
        let owner = OwnerId::generate();
        let started = self.clock.now_millis();

        loop {
            match self.attempt(key, owner, started, config)? {
                Attempt::Acquired(record) => return Ok(record),
                Attempt::Reclaimed => continue,
                Attempt::Busy => {
                    trace!(lock = %key, "lock busy");
                    thread::sleep(config.spin_delay);
                }
                Attempt::TimedOut(waited) => {
                    return Err(LockError::WaitTimeout {
                        key: key.to_string(),
                        waited,
                    })
                }
            }
        }
    }

    /// One iteration of the acquisition loop. Never sleeps.
    fn attempt(
        &self,
        key: &LockKey,
        owner: OwnerId,
        started: u64,
        config: &LockConfig,
    ) -> Result<Attempt, LockError> {
        let now = self.clock.now_millis();
        if let Some(deadline) = config.wait_timeout.deadline_from(started) {
            if now >= deadline {
                let waited = Duration::from_millis(now.saturating_sub(started));
                debug!(lock = %key, ?waited, "gave up waiting for lock");
                return Ok(Attempt::TimedOut(waited));
            }
        }

        match self.store.lookup(key)? {
            Some(stale) if stale.is_expired(now) => {
                // Another contender may win this race; either way the next
                // pass sees a fresh view of the key.
                let reclaimed = self.store.remove_if_equal(key, &stale)?;
                warn!(lock = %key, stale_owner = %stale.owner, reclaimed, "reclaiming stale lock");
                Ok(Attempt::Reclaimed)
            }
            Some(_) => Ok(Attempt::Busy),
            None => {
                let record = LockRecord::new(owner, config.lease().deadline_from(now).into());
                if self.store.insert_if_absent(key, record)? {
                    debug!(
                        lock = %key,
                        owner = %owner,
                        expires_at = ?record.expires_at,
                        "acquired lock"
                    );
                    Ok(Attempt::Acquired(record))
                } else {
                    Ok(Attempt::Busy)
                }
            }
        }
    }

    /// Map a finished run to the caller's result. Called after release.
    fn finish<R>(
        &self,
        key: &LockKey,
        outcome: Result<Finished<R>, LockError>,
        config: &LockConfig,
    ) -> Result<R, LockError> {
        match outcome? {
            Finished::Completed(value) => Ok(value),
            Finished::TimedOut => {
                let timeout = config.exec_timeout.as_duration().unwrap_or_default();
                warn!(lock = %key, ?timeout, "lock callback timed out");
                Err(LockError::ExecTimeout {
                    key: key.to_string(),
                    timeout,
                })
            }
            Finished::Panicked(payload) => panic::resume_unwind(payload),
        }
    }
}
