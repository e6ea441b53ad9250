//! The storage collaborator contract

use crate::{Error, Result};
use scope_model::{ConfigKey, ConfigTree, ScopePath};
use std::collections::BTreeMap;
use std::fmt;

/// Persistence boundary for configuration snapshots.
///
/// Implementations own I/O, timeouts and cross-process coordination; callers
/// invoke them synchronously.
pub trait ConfigStorage: Send + Sync + fmt::Debug {
    /// Load the snapshot stored under `key`, if any.
    fn load(&self, key: &ConfigKey) -> Result<Option<ConfigTree>>;

    /// Store a snapshot that does not exist yet.
    ///
    /// # Errors
    ///
    /// [`Error::StaleConfig`] if a snapshot already exists at the tree's key.
    fn save(&self, tree: &ConfigTree) -> Result<()>;

    /// Replace an existing snapshot with a newer version.
    ///
    /// # Errors
    ///
    /// [`Error::StaleConfig`] if nothing is stored at the tree's key or the
    /// stored version is greater than or equal to `tree.version()`.
    fn update(&self, tree: &ConfigTree) -> Result<()>;

    /// Delete the snapshot at `key`, and with `delete_children` every snapshot
    /// of the same type whose path starts with `key.path`.
    ///
    /// Returns the number of snapshots removed.
    fn delete(&self, key: &ConfigKey, delete_children: bool) -> Result<usize>;

    /// Paths of `type_name` snapshots containing a scope called `scope_name`
    /// that carries all of `properties`.
    fn list_scopes(
        &self,
        type_name: &str,
        scope_name: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<Vec<ScopePath>>;
}

pub(crate) fn check_save(key: &ConfigKey, existing: bool) -> Result<()> {
    if existing {
        return Err(Error::stale(key, "a snapshot already exists"));
    }
    Ok(())
}

pub(crate) fn check_update(
    key: &ConfigKey,
    stored: Option<&ConfigTree>,
    incoming: &ConfigTree,
) -> Result<()> {
    let Some(stored) = stored else {
        return Err(Error::stale(key, "no snapshot is stored"));
    };
    if stored.version() >= incoming.version() {
        return Err(Error::stale(
            key,
            format!(
                "stored version {} is not older than version {}",
                stored.version(),
                incoming.version()
            ),
        ));
    }
    Ok(())
}

pub(crate) fn scope_matches(
    path: &ScopePath,
    scope_name: &str,
    properties: &BTreeMap<String, String>,
) -> bool {
    path.scopes()
        .iter()
        .any(|s| s.name() == scope_name && s.contains_all(properties))
}
