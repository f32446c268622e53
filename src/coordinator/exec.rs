//! Runs a lock callback on its own thread under a time budget.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError};
use std::sync::Arc;
use std::thread;

use crate::config::Timeout;
use crate::error::LockError;
use crate::lock::LockKey;

/// Cooperative cancellation flag handed to every lock callback.
///
/// A thread cannot be killed from outside, so when a callback overruns its
/// `exec_timeout` the coordinator trips this flag, releases the lock and
/// abandons the thread. Long-running callbacks should poll
/// [`is_cancelled`](Self::is_cancelled) and stop writing once it is set;
/// anything written after that point happens without the lock held.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub(crate) fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// How a callback run ended.
pub(crate) enum Finished<R> {
    Completed(R),
    TimedOut,
    Panicked(Box<dyn Any + Send + 'static>),
}

/// Spawn `callback` on a worker thread and wait for it up to `timeout`.
pub(crate) fn run_with_timeout<E, F, R>(
    key: &LockKey,
    entries: Vec<E>,
    callback: F,
    timeout: Timeout,
) -> Result<Finished<R>, LockError>
where
    E: Send + 'static,
    F: FnOnce(Vec<E>, Cancellation) -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = sync_channel(1);
    let cancel = Cancellation::new();
    let token = cancel.clone();

    let handle = thread::Builder::new()
        .name(format!("lock:{}", key).replace('\0', ""))
        .spawn(move || {
            let _ = tx.send(callback(entries, token));
        })
        .map_err(|e| LockError::Spawn(e.to_string()))?;

    let received = match timeout.as_duration() {
        Some(limit) => rx.recv_timeout(limit),
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };

    match received {
        Ok(value) => {
            let _ = handle.join();
            Ok(Finished::Completed(value))
        }
        Err(RecvTimeoutError::Timeout) => {
            // The handle is dropped here, detaching the worker.
            cancel.cancel();
            Ok(Finished::TimedOut)
        }
        Err(RecvTimeoutError::Disconnected) => match handle.join() {
            Err(payload) => Ok(Finished::Panicked(payload)),
            Ok(()) => Ok(Finished::Panicked(Box::new(
                "lock worker exited without a result",
            ))),
        },
    }
}
