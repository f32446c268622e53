//! Async flavour of the coordinator, running callbacks as tokio tasks.
//!
//! Unlike the thread-based path, an overrunning callback is aborted at its
//! next `.await` instead of being left to notice a cancellation flag.

use std::future::Future;

use tokio::task::{JoinError, JoinHandle};
use tracing::trace;

use super::exec::Finished;
use super::{Attempt, LockCoordinator};
use crate::clock::Clock;
use crate::config::{LockConfig, Timeout};
use crate::error::LockError;
use crate::lock::{LockKey, LockRecord, LockStore, OwnerId};
use crate::table::Table;

impl<S: LockStore, C: Clock> LockCoordinator<S, C> {
    /// Async counterpart of [`with_lock`](Self::with_lock).
    pub async fn with_lock_async<T, F, Fut, R>(
        &self,
        table: &T,
        key: &T::Key,
        callback: F,
    ) -> Result<R, LockError>
    where
        T: Table,
        F: FnOnce(Vec<T::Entry>) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        self.with_lock_async_config(table, key, callback, &self.config)
            .await
    }

    /// Async counterpart of [`with_lock_config`](Self::with_lock_config).
    ///
    /// Must be called from within a tokio runtime. The callback's future is
    /// spawned as its own task and aborted if it overruns `exec_timeout`.
    /// Dropping the returned future aborts the task and releases the lock.
    pub async fn with_lock_async_config<T, F, Fut, R>(
        &self,
        table: &T,
        key: &T::Key,
        callback: F,
        config: &LockConfig,
    ) -> Result<R, LockError>
    where
        T: Table,
        F: FnOnce(Vec<T::Entry>) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let lock_key = LockKey::new(table.name(), key)?;
        let held = self.hold(&lock_key, self.acquire_async(&lock_key, config).await?);

        let outcome = match table.entries(key) {
            Ok(entries) => run_task(callback(entries), config.exec_timeout).await,
            Err(e) => Err(e),
        };

        drop(held);
        self.finish(&lock_key, outcome, config)
    }

    async fn acquire_async(
        &self,
        key: &LockKey,
        config: &LockConfig,
    ) -> Result<LockRecord, LockError> {
        let owner = OwnerId::generate();
        let started = self.clock.now_millis();

        loop {
            match self.attempt(key, owner, started, config)? {
                Attempt::Acquired(record) => return Ok(record),
                Attempt::Reclaimed => continue,
                Attempt::Busy => {
                    trace!(lock = %key, "lock busy");
                    tokio::time::sleep(config.spin_delay).await;
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
}

/// Aborts the spawned callback when dropped, so it never outlives its lock.
struct AbortOnDrop<R>(JoinHandle<R>);

impl<R> Drop for AbortOnDrop<R> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_task<Fut, R>(future: Fut, timeout: Timeout) -> Result<Finished<R>, LockError>
where
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    let mut task = AbortOnDrop(tokio::spawn(future));

    let joined = match timeout.as_duration() {
        Some(limit) => match tokio::time::timeout(limit, &mut task.0).await {
            Ok(joined) => joined,
            Err(_) => return Ok(Finished::TimedOut),
        },
        None => (&mut task.0).await,
    };

    joined.map(Finished::Completed).or_else(from_join_error)
}

fn from_join_error<R>(err: JoinError) -> Result<Finished<R>, LockError> {
    if err.is_panic() {
        Ok(Finished::Panicked(err.into_panic()))
    } else {
        Err(LockError::Spawn(err.to_string()))
    }
}
