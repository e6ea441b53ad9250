//! The configuration service
//!
//! [`ConfigService`] owns the collaborators of the resolution pipeline and is
//! constructed once, then shared by reference:
//!
//! ```text
//! load:  ancestor paths -> cache / storage -> migrate -> merge -> decode
//! save:  per-key lock -> latest chain from storage -> migrate -> reconcile
//!        -> save / update -> cache
//! ```

use crate::binding::{Bound, Configuration, Handle};
use crate::cache::{ConfigCache, DEFAULT_CAPACITY};
use crate::codec::TreeCodec;
use crate::locks::KeyedLocks;
use crate::merge::MergeEngine;
use crate::migration::{MigrationRegistry, MigrationResolver};
use crate::reconcile::{ResolvedConflict, SaveOutcome, VersionReconciler};
use crate::references::ReferenceGraph;
use crate::settings::Settings;
use crate::strategy::{MergeStrategy, SchemaPolicies, StrategyRegistry};
use crate::{Error, Result};
use scope_model::{
    ConfigKey, ConfigTree, SchemaRegistry, ScopeDefinition, ScopePath, ScopeRegistry, TypeSchema,
};
use scope_store::ConfigStorage;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An effective tree and the chain it was merged from.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Merged tree addressed at the requested path.
    pub effective: ConfigTree,
    /// Existing snapshots along the path, root first.
    pub chain: Vec<Arc<ConfigTree>>,
}

/// Result of a successful save.
#[derive(Debug, Clone)]
pub struct SaveReport {
    /// The leaf snapshot as persisted.
    pub tree: Arc<ConfigTree>,
    pub outcome: SaveOutcome,
    pub resolved: Vec<ResolvedConflict>,
}

/// Resolves, saves and deletes scope-addressed configurations.
#[derive(Debug)]
pub struct ConfigService {
    storage: Arc<dyn ConfigStorage>,
    cache: ConfigCache,
    locks: KeyedLocks,
    schemas: SchemaRegistry,
    strategies: StrategyRegistry,
    migrations: MigrationRegistry,
    scopes: ScopeRegistry,
}

impl ConfigService {
    pub fn builder(storage: Arc<dyn ConfigStorage>) -> ConfigServiceBuilder {
        ConfigServiceBuilder {
            storage,
            cache_capacity: DEFAULT_CAPACITY,
            schemas: SchemaRegistry::new(),
            strategies: StrategyRegistry::with_defaults(),
            migrations: MigrationRegistry::new(),
            scopes: ScopeRegistry::new(),
        }
    }

    /// A builder over the storage backend and cache size named in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<ConfigServiceBuilder> {
        Ok(Self::builder(settings.open_storage()?).settings(settings))
    }

    pub fn storage(&self) -> &Arc<dyn ConfigStorage> {
        &self.storage
    }

    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn codec(&self) -> TreeCodec<'_> {
        TreeCodec::new(&self.schemas)
    }

    fn policies(&self) -> SchemaPolicies<'_> {
        SchemaPolicies::new(&self.schemas, &self.strategies)
    }

    fn current_class_version(&self, type_name: &str) -> Option<u32> {
        self.schemas.get(type_name).map(TypeSchema::class_version)
    }

    /// Bring a stored snapshot to the registered class version of its type.
    fn migrate_loaded(&self, tree: ConfigTree) -> Result<ConfigTree> {
        let Some(target) = self.current_class_version(tree.type_name()) else {
            return Ok(tree);
        };
        let migrated =
            match MigrationResolver::migrate(&tree, target, self.migrations.edges(tree.type_name()))? {
                Cow::Owned(migrated) => Some(migrated),
                Cow::Borrowed(_) => None,
            };
        Ok(migrated.unwrap_or(tree))
    }

    fn fetch(&self, key: &ConfigKey) -> Result<Option<ConfigTree>> {
        self.storage
            .load(key)?
            .map(|tree| self.migrate_loaded(tree))
            .transpose()
    }

    /// Existing snapshots for every level of `key.path`, root first.
    ///
    /// Reads through the cache; snapshots are migrated before caching.
    pub fn load_chain(&self, key: &ConfigKey) -> Result<Vec<Arc<ConfigTree>>> {
        self.scopes.validate(&key.path)?;
        let mut chain = Vec::new();
        for path in key.path.ancestor_paths() {
            let level = ConfigKey::new(key.type_name.clone(), path);
            if let Some(tree) = self.cache.get_or_load(&level, || self.fetch(&level))? {
                tracing::debug!(key = %level, version = tree.version(), "Loaded chain level");
                chain.push(tree);
            }
        }
        Ok(chain)
    }

    /// Load and merge the chain of `key`.
    ///
    /// A path without any snapshot resolves to an empty tree.
    pub fn resolve(&self, key: &ConfigKey) -> Result<Resolved> {
        let chain = self.load_chain(key)?;
        let effective = if chain.is_empty() {
            let class_version = self.current_class_version(&key.type_name).unwrap_or(1);
            ConfigTree::new(key.type_name.clone(), key.path.clone()).with_class_version(class_version)
        } else {
            let merged = MergeEngine::merge(&chain, &self.policies())?;
            let class_version = merged.class_version();
            ConfigTree::from_root(key.path.clone(), merged.into_root())
                .with_class_version(class_version)
        };
        Ok(Resolved { effective, chain })
    }

    /// Persist an edited effective tree at its own scope path.
    ///
    /// `baseline` is the chain `local` was resolved from. The save holds the
    /// lock of the leaf key and reads the latest chain from storage.
    ///
    /// # Errors
    ///
    /// Conflicts without a staleness policy fail with
    /// [`Error::ConflictUnresolved`]; losing a versioning race fails with a
    /// stale storage error (see [`Error::is_stale`]). Both evict the chain
    /// from the cache, so resolving again yields a fresh baseline.
    pub fn save(&self, local: &ConfigTree, baseline: &[Arc<ConfigTree>]) -> Result<SaveReport> {
        let key = local.key();
        self.scopes.validate(&key.path)?;
        self.locks
            .with_lock(&key, || self.save_locked(&key, local, baseline))
    }

    fn save_locked(
        &self,
        key: &ConfigKey,
        local: &ConfigTree,
        baseline: &[Arc<ConfigTree>],
    ) -> Result<SaveReport> {
        let mut latest = Vec::new();
        let mut stored_leaf_class = None;
        for path in key.path.ancestor_paths() {
            let level = ConfigKey::new(key.type_name.clone(), path);
            if let Some(tree) = self.storage.load(&level)? {
                if level == *key {
                    stored_leaf_class = Some(tree.class_version());
                }
                latest.push(self.migrate_loaded(tree)?);
            }
        }

        let mut reconciliation =
            match VersionReconciler::reconcile_on_save(local, &latest, baseline, &self.policies()) {
                Ok(reconciliation) => reconciliation,
                Err(err) => {
                    if matches!(err, Error::ConflictUnresolved { .. }) {
                        self.evict_chain(key);
                    }
                    return Err(err);
                }
            };

        // A leaf still stored at an older class version is rewritten in its
        // migrated form even when its content did not change.
        if reconciliation.outcome == SaveOutcome::Unchanged
            && stored_leaf_class.is_some_and(|stored| stored < reconciliation.tree.class_version())
        {
            let version = reconciliation.tree.version() + 1;
            reconciliation.tree.set_version(version);
            reconciliation.outcome = SaveOutcome::Update;
        }

        let written = match reconciliation.outcome {
            SaveOutcome::Create => self.storage.save(&reconciliation.tree),
            SaveOutcome::Update => self.storage.update(&reconciliation.tree),
            SaveOutcome::Unchanged => Ok(()),
        };
        if let Err(err) = written {
            if err.is_stale() {
                tracing::warn!(%key, "Stale save, evicting cached chain");
                self.evict_chain(key);
            }
            return Err(err.into());
        }

        let tree = Arc::new(reconciliation.tree);
        self.cache.put(Arc::clone(&tree));
        tracing::debug!(
            %key,
            version = tree.version(),
            outcome = ?reconciliation.outcome,
            resolved = reconciliation.resolved.len(),
            "Saved configuration"
        );
        Ok(SaveReport {
            tree,
            outcome: reconciliation.outcome,
            resolved: reconciliation.resolved,
        })
    }

    /// Drop every level of `key` from the cache so the next resolve reads
    /// what a failed save found in storage.
    fn evict_chain(&self, key: &ConfigKey) {
        for path in key.path.ancestor_paths() {
            self.cache
                .invalidate(&ConfigKey::new(key.type_name.clone(), path));
        }
    }

    /// Delete the snapshot at `key`, and with `delete_children` every snapshot
    /// of the same type below it. Returns the number removed.
    pub fn delete(&self, key: &ConfigKey, delete_children: bool) -> Result<usize> {
        self.scopes.validate(&key.path)?;
        self.locks.with_lock(key, || {
            let removed = self.storage.delete(key, delete_children)?;
            if delete_children {
                self.cache.invalidate_prefix(&key.type_name, &key.path);
            } else {
                self.cache.invalidate(key);
            }
            tracing::debug!(%key, removed, delete_children, "Deleted configuration");
            Ok(removed)
        })
    }

    /// Stored paths of `type_name` containing a `scope_name` scope with all
    /// of `properties`.
    pub fn list_scopes(
        &self,
        type_name: &str,
        scope_name: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<Vec<ScopePath>> {
        Ok(self.storage.list_scopes(type_name, scope_name, properties)?)
    }

    fn type_name_of<T: Configuration>(&self) -> Result<String> {
        let schema = T::schema()?;
        if !self.schemas.contains(schema.name()) {
            return Err(Error::UnknownType(schema.name().to_string()));
        }
        Ok(schema.name().to_string())
    }

    /// Resolve and decode the configuration of type `T` at `path`.
    pub fn load<T: Configuration>(&self, path: &ScopePath) -> Result<Bound<T>> {
        let key = ConfigKey::new(self.type_name_of::<T>()?, path.clone());
        let Resolved { effective, chain } = self.resolve(&key)?;
        let value = self.codec().decode::<T>(effective.root())?;
        Ok(Bound::new(key, value, effective, chain))
    }

    /// Save the dirty properties of `bound`, then reload it.
    ///
    /// Returns `None` without touching storage when nothing is dirty.
    pub fn save_bound<T: Configuration>(&self, bound: &mut Bound<T>) -> Result<Option<SaveReport>> {
        if !bound.is_dirty() {
            tracing::trace!(key = %bound.key(), "Nothing to save");
            return Ok(None);
        }

        let encoded = self.codec().encode(bound.get(), &bound.key().type_name)?;
        let mut local = bound.effective().clone();
        for property in bound.dirty_properties() {
            let value = encoded.property_at(property).cloned();
            local.root_mut().replace_at(property, value, &encoded)?;
        }

        let report = self.save(&local, bound.chain())?;
        self.refresh(bound)?;
        Ok(Some(report))
    }

    /// Reload `bound` from the current snapshots, discarding unsaved edits.
    pub fn refresh<T: Configuration>(&self, bound: &mut Bound<T>) -> Result<()> {
        let Resolved { effective, chain } = self.resolve(bound.key())?;
        let value = self.codec().decode::<T>(effective.root())?;
        bound.reset(value, effective, chain);
        Ok(())
    }

    /// A lazily loaded handle to the configuration of type `T` at `path`.
    pub fn handle<T: Configuration>(&self, path: ScopePath) -> Handle<'_, T> {
        Handle::new(self, path)
    }

    /// The graph of configurations reachable through reference properties.
    pub fn references(&self, start: &ConfigKey) -> Result<ReferenceGraph> {
        ReferenceGraph::build(start.clone(), &self.schemas, |key| {
            self.resolve(key).map(|resolved| resolved.effective)
        })
    }
}

/// Builder for [`ConfigService`].
#[derive(Debug)]
pub struct ConfigServiceBuilder {
    storage: Arc<dyn ConfigStorage>,
    cache_capacity: usize,
    schemas: SchemaRegistry,
    strategies: StrategyRegistry,
    migrations: MigrationRegistry,
    scopes: ScopeRegistry,
}

impl ConfigServiceBuilder {
    #[must_use]
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.cache_capacity = settings.cache.capacity;
        self
    }

    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Register a root or nested type schema.
    #[must_use]
    pub fn schema(mut self, schema: TypeSchema) -> Self {
        self.schemas.register(schema);
        self
    }

    /// Register the schemas of a [`Configuration`] type.
    pub fn configuration<T: Configuration>(mut self) -> Result<Self> {
        self.schemas.register(T::schema()?);
        for nested in T::nested_schemas()? {
            self.schemas.register(nested);
        }
        Ok(self)
    }

    #[must_use]
    pub fn strategy(mut self, strategy: impl MergeStrategy + 'static) -> Self {
        self.strategies.register(strategy);
        self
    }

    #[must_use]
    pub fn migrations(mut self, migrations: MigrationRegistry) -> Self {
        self.migrations = migrations;
        self
    }

    #[must_use]
    pub fn scope(mut self, definition: ScopeDefinition) -> Self {
        self.scopes.register(definition);
        self
    }

    /// # Errors
    ///
    /// [`Error::UnknownStrategy`] if a schema names an unregistered strategy.
    pub fn build(self) -> Result<ConfigService> {
        for schema in self.schemas.iter() {
            self.strategies.validate(schema)?;
        }
        tracing::debug!(
            types = self.schemas.len(),
            cache_capacity = self.cache_capacity,
            "Built configuration service"
        );
        Ok(ConfigService {
            storage: self.storage,
            cache: ConfigCache::new(self.cache_capacity),
            locks: KeyedLocks::new(),
            schemas: self.schemas,
            strategies: self.strategies,
            migrations: self.migrations,
            scopes: self.scopes,
        })
    }
}
