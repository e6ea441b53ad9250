//! Typed access to resolved configurations
//!
//! A [`Bound<T>`] pairs a typed value with the snapshot chain it was resolved
//! from. Edits go through [`Bound::set`], which records the property as dirty;
//! saving writes only dirty properties so values inherited from ancestor
//! scopes are never copied into the leaf snapshot.
//!
//! A [`Handle<T>`] defers the load until first use and memoizes the result.

use crate::service::ConfigService;
use crate::{Error, Result};
use once_cell::sync::OnceCell;
use scope_model::{ConfigKey, ConfigTree, ScopePath, TypeSchema};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// A root configuration type.
///
/// Field names of the serialized form must match the schema's property names.
/// Nested complex and collection element types are described by
/// [`Configuration::nested_schemas`].
pub trait Configuration: Serialize + DeserializeOwned + Default {
    fn schema() -> scope_model::Result<TypeSchema>;

    fn nested_schemas() -> scope_model::Result<Vec<TypeSchema>> {
        Ok(Vec::new())
    }
}

/// A typed configuration value with dirty tracking.
#[derive(Debug, Clone)]
pub struct Bound<T> {
    key: ConfigKey,
    value: T,
    effective: ConfigTree,
    chain: Vec<Arc<ConfigTree>>,
    dirty: BTreeSet<String>,
}

impl<T: Configuration> Bound<T> {
    pub(crate) fn new(
        key: ConfigKey,
        value: T,
        effective: ConfigTree,
        chain: Vec<Arc<ConfigTree>>,
    ) -> Self {
        Self {
            key,
            value,
            effective,
            chain,
            dirty: BTreeSet::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replace the property at a dotted path and mark it dirty.
    ///
    /// # Errors
    ///
    /// [`Error::Binding`] if the first path segment is not a field of `T` or
    /// the new value does not fit the field.
    pub fn set<V: Serialize>(&mut self, property: &str, value: V) -> Result<()> {
        let binding_error = |message: String| Error::binding(self.key.type_name.clone(), message);

        let value = serde_json::to_value(value).map_err(|e| binding_error(e.to_string()))?;
        let mut current =
            serde_json::to_value(&self.value).map_err(|e| binding_error(e.to_string()))?;
        if !set_path(&mut current, property, value) {
            return Err(binding_error(format!("unknown property '{property}'")));
        }
        let updated: T = serde_json::from_value(current).map_err(|e| binding_error(e.to_string()))?;

        self.value = updated;
        self.dirty.insert(property.to_string());
        Ok(())
    }

    /// Dotted paths of properties changed since the last load, save or refresh.
    pub fn dirty_properties(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    pub fn path(&self) -> &ScopePath {
        &self.key.path
    }

    /// The merged tree the value was decoded from.
    pub fn effective(&self) -> &ConfigTree {
        &self.effective
    }

    /// The snapshots the value was resolved from, root first.
    pub fn chain(&self) -> &[Arc<ConfigTree>] {
        &self.chain
    }

    /// Version of the persisted leaf snapshot, if the leaf scope has one.
    pub fn version(&self) -> Option<u64> {
        self.chain
            .last()
            .filter(|t| t.defining_scope_path() == &self.key.path)
            .map(|t| t.version())
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub(crate) fn reset(&mut self, value: T, effective: ConfigTree, chain: Vec<Arc<ConfigTree>>) {
        self.value = value;
        self.effective = effective;
        self.chain = chain;
        self.dirty.clear();
    }
}

/// Set a dotted path inside a JSON object, creating intermediate objects
/// where the current value is null. Fails if the first segment is unknown.
fn set_path(root: &mut Value, path: &str, value: Value) -> bool {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };
    if segments.iter().any(|s| s.is_empty()) {
        return false;
    }
    let Some(object) = root.as_object() else {
        return false;
    };
    if !object.contains_key(segments[0]) {
        return false;
    }

    let mut node = root;
    for segment in parents {
        let Some(object) = node.as_object_mut() else {
            return false;
        };
        let child = object
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if child.is_null() {
            *child = Value::Object(Map::new());
        }
        node = child;
    }
    match node.as_object_mut() {
        Some(object) => {
            object.insert(last.to_string(), value);
            true
        }
        None => false,
    }
}

/// Lazily loaded configuration, memoized on first access.
#[derive(Debug)]
pub struct Handle<'s, T> {
    service: &'s ConfigService,
    path: ScopePath,
    cell: OnceCell<Bound<T>>,
}

impl<'s, T: Configuration> Handle<'s, T> {
    pub(crate) fn new(service: &'s ConfigService, path: ScopePath) -> Self {
        Self {
            service,
            path,
            cell: OnceCell::new(),
        }
    }

    /// Load on first call, then return the memoized value.
    pub fn get(&self) -> Result<&Bound<T>> {
        self.cell.get_or_try_init(|| self.service.load::<T>(&self.path))
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn path(&self) -> &ScopePath {
        &self.path
    }

    /// The loaded value, if [`Handle::get`] has succeeded.
    pub fn into_inner(self) -> Option<Bound<T>> {
        self.cell.into_inner()
    }
}
