//! Per-key mutual exclusion for the save path

use dashmap::DashMap;
use parking_lot::Mutex;
use scope_model::ConfigKey;
use std::sync::Arc;

/// One mutex per snapshot key, created on demand and dropped when unused.
///
/// Saves to different keys never contend; there is no cross-key locking.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<ConfigKey, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: &ConfigKey, f: impl FnOnce() -> T) -> T {
        let lock = Arc::clone(&self.locks.entry(key.clone()).or_default());
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        // Entry and removal both hold the shard lock, so a count of one
        // means nobody else is waiting on this key.
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Number of keys with a live lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
