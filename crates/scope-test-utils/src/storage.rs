//! Storage backends for assertions on I/O.

use scope_model::{ConfigKey, ConfigTree, ScopePath};
use scope_store::{ConfigStorage, FileStorage, MemoryStorage, Result, StorageFormat};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// A [`MemoryStorage`] that counts calls per operation.
#[derive(Debug, Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    loads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls to `load`.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Calls to `save` and `update`, successful or not.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.loads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }
}

impl ConfigStorage for CountingStorage {
    fn load(&self, key: &ConfigKey) -> Result<Option<ConfigTree>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(key)
    }

    fn save(&self, tree: &ConfigTree) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save(tree)
    }

    fn update(&self, tree: &ConfigTree) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update(tree)
    }

    fn delete(&self, key: &ConfigKey, delete_children: bool) -> Result<usize> {
        self.inner.delete(key, delete_children)
    }

    fn list_scopes(
        &self,
        type_name: &str,
        scope_name: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<Vec<ScopePath>> {
        self.inner.list_scopes(type_name, scope_name, properties)
    }
}

/// A [`FileStorage`] rooted in a temporary directory that lives as long as
/// the store.
#[derive(Debug)]
pub struct TempStore {
    storage: FileStorage,
    dir: TempDir,
}

impl TempStore {
    pub fn new(format: StorageFormat) -> Self {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("failed to create temp dir: {e}"));
        let storage = FileStorage::new(dir.path(), format);
        Self { storage, dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    /// A second handle on the same directory, as another process would open it.
    pub fn reopen(&self) -> FileStorage {
        FileStorage::new(self.dir.path(), self.storage.format())
    }
}
