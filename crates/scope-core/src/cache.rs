//! Read-through LRU cache of persisted snapshots

use lru::LruCache;
use parking_lot::Mutex;
use scope_model::{ConfigKey, ConfigTree, ScopePath};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_CAPACITY: usize = 400;

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Fixed-capacity cache keyed by type and scope path.
///
/// Every operation takes the internal lock once, so each get, put and
/// invalidate is atomic per key. Loaders run outside the lock. A loaded
/// snapshot is only inserted if no newer one was cached meanwhile and no
/// invalidation happened while it was loading. Absent snapshots are not
/// cached.
#[derive(Debug)]
pub struct ConfigCache {
    entries: Mutex<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug)]
struct Entries {
    lru: LruCache<ConfigKey, Arc<ConfigTree>>,
    /// Bumped by every invalidation; read-through inserts started under an
    /// older generation are dropped.
    generation: u64,
}

impl Entries {
    fn invalidated(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ConfigCache {
    /// A cache holding at most `capacity` snapshots; zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(Entries {
                lru: LruCache::new(capacity),
                generation: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().lru.cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().lru.is_empty()
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&self, key: &ConfigKey) -> Option<Arc<ConfigTree>> {
        let found = self.entries.lock().lru.get(key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Whether `key` is cached, without touching recency or counters.
    pub fn contains(&self, key: &ConfigKey) -> bool {
        self.entries.lock().lru.contains(key)
    }

    /// Return the cached snapshot, or call `loader` and cache what it finds.
    ///
    /// If an equal or newer version of `key` was inserted while `loader` ran,
    /// that entry is kept and returned instead.
    pub fn get_or_load<F, E>(&self, key: &ConfigKey, loader: F) -> Result<Option<Arc<ConfigTree>>, E>
    where
        F: FnOnce() -> Result<Option<ConfigTree>, E>,
    {
        if let Some(tree) = self.get(key) {
            return Ok(Some(tree));
        }
        let started = self.entries.lock().generation;
        let Some(tree) = loader()? else {
            return Ok(None);
        };
        let loaded = Arc::new(tree);

        let mut entries = self.entries.lock();
        if let Some(cached) = entries.lru.get(key)
            && cached.version() >= loaded.version()
        {
            return Ok(Some(Arc::clone(cached)));
        }
        if entries.generation != started {
            tracing::trace!(%key, "Skipping cache insert after concurrent invalidation");
            return Ok(Some(loaded));
        }
        entries.lru.put(key.clone(), Arc::clone(&loaded));
        Ok(Some(loaded))
    }

    /// Insert or replace a snapshot under its own key.
    pub fn put(&self, tree: Arc<ConfigTree>) {
        self.entries.lock().lru.put(tree.key(), tree);
    }

    pub fn invalidate(&self, key: &ConfigKey) -> bool {
        let mut entries = self.entries.lock();
        entries.invalidated();
        entries.lru.pop(key).is_some()
    }

    /// Drop every entry of `type_name` whose path starts with `prefix`.
    pub fn invalidate_prefix(&self, type_name: &str, prefix: &ScopePath) -> usize {
        let mut entries = self.entries.lock();
        entries.invalidated();
        let doomed: Vec<ConfigKey> = entries
            .lru
            .iter()
            .map(|(key, _)| key)
            .filter(|key| key.type_name == type_name && key.path.starts_with(prefix))
            .cloned()
            .collect();
        for key in &doomed {
            entries.lru.pop(key);
        }
        doomed.len()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.invalidated();
        entries.lru.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
