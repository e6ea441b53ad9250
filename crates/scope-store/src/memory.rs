//! In-memory storage backend

use crate::storage::{check_save, check_update, scope_matches};
use crate::{ConfigStorage, Result};
use parking_lot::RwLock;
use scope_model::{ConfigKey, ConfigTree, ScopePath};
use std::collections::BTreeMap;

/// Snapshots held in an ordered map behind a read/write lock.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<ConfigKey, ConfigTree>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All stored keys in order.
    pub fn keys(&self) -> Vec<ConfigKey> {
        self.entries.read().keys().cloned().collect()
    }
}

impl ConfigStorage for MemoryStorage {
    fn load(&self, key: &ConfigKey) -> Result<Option<ConfigTree>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn save(&self, tree: &ConfigTree) -> Result<()> {
        let key = tree.key();
        let mut entries = self.entries.write();
        check_save(&key, entries.contains_key(&key))?;
        tracing::debug!(%key, version = tree.version(), "Saved snapshot");
        entries.insert(key, tree.clone());
        Ok(())
    }

    fn update(&self, tree: &ConfigTree) -> Result<()> {
        let key = tree.key();
        let mut entries = self.entries.write();
        check_update(&key, entries.get(&key), tree)?;
        tracing::debug!(%key, version = tree.version(), "Updated snapshot");
        entries.insert(key, tree.clone());
        Ok(())
    }

    fn delete(&self, key: &ConfigKey, delete_children: bool) -> Result<usize> {
        let mut entries = self.entries.write();
        if !delete_children {
            return Ok(usize::from(entries.remove(key).is_some()));
        }
        let before = entries.len();
        entries.retain(|k, _| !(k.type_name == key.type_name && k.path.starts_with(&key.path)));
        Ok(before - entries.len())
    }

    fn list_scopes(
        &self,
        type_name: &str,
        scope_name: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<Vec<ScopePath>> {
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|k| k.type_name == type_name && scope_matches(&k.path, scope_name, properties))
            .map(|k| k.path.clone())
            .collect())
    }
}
