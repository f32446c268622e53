#![allow(dead_code)]

use std::time::Duration;

use table_lock::{InMemoryLockStore, LockConfig, LockCoordinator};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// A coordinator over a private store, spinning every millisecond.
pub fn coordinator() -> LockCoordinator {
    init_tracing();
    LockCoordinator::new(InMemoryLockStore::new())
        .with_config(LockConfig::default().spin_delay(ms(1)))
}
