mod in_memory;
mod key;
mod record;
mod store;

pub use in_memory::InMemoryLockStore;
pub use key::LockKey;
pub use record::{Expiry, LockRecord, OwnerId};
pub use store::LockStore;
