//! Schema descriptors
//!
//! A [`TypeSchema`] lists the properties of one configuration type together
//! with the metadata the resolution engine needs: the merge strategy used when
//! an ancestor and a descendant scope both define the property, and the
//! staleness policy applied when a save races with a concurrent edit.
//!
//! Schemas are built once at registration time:
//!
//! ```
//! use scope_model::{PropertyKind, StalenessPolicy, TypeSchema};
//!
//! let schema = TypeSchema::builder("AppConfig")
//!     .class_version(2)
//!     .simple("theme", "string")
//!     .simple("telemetry", "bool")
//!     .merge_with("parent_false_wins")
//!     .on_stale(StalenessPolicy::UseParent)
//!     .complex("db", "Database")
//!     .list("plugins", "string")
//!     .build()
//!     .unwrap();
//!
//! let telemetry = schema.property("telemetry").unwrap();
//! assert_eq!(telemetry.merge_strategy.as_deref(), Some("parent_false_wins"));
//! assert_eq!(schema.property("db").unwrap().kind, PropertyKind::Complex);
//! ```

use crate::{Error, PropertyKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How a save resolves a property that was edited locally while someone else
/// persisted a different value for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessPolicy {
    /// Discard the local edit and keep the persisted value.
    UseParent,
    /// Recombine persisted and local values with the property's merge strategy.
    Merge,
}

/// Metadata for one property of a configuration type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySchema {
    pub name: String,
    pub kind: PropertyKind,
    /// Value type for simple properties, element type for collections,
    /// schema type name for complex properties.
    pub type_name: String,
    /// Registered strategy name; `None` means child overwrites.
    pub merge_strategy: Option<String>,
    /// Conflict policy; `None` means conflicts abort the save.
    pub staleness: Option<StalenessPolicy>,
    /// For reference properties, the configuration type the stored scope path points at.
    pub references: Option<String>,
}

impl PropertySchema {
    pub fn new(name: impl Into<String>, kind: PropertyKind, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            type_name: type_name.into(),
            merge_strategy: None,
            staleness: None,
            references: None,
        }
    }
}

/// Explicit description of one configuration type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchema {
    name: String,
    class_version: u32,
    properties: Vec<PropertySchema>,
}

impl TypeSchema {
    pub fn builder(name: impl Into<String>) -> TypeSchemaBuilder {
        TypeSchemaBuilder {
            name: name.into(),
            class_version: 1,
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current schema version snapshots are migrated to.
    pub fn class_version(&self) -> u32 {
        self.class_version
    }

    pub fn properties(&self) -> &[PropertySchema] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Builder for [`TypeSchema`].
///
/// `merge_with`, `on_stale` and `references` apply to the most recently
/// declared property.
#[derive(Debug, Clone)]
pub struct TypeSchemaBuilder {
    name: String,
    class_version: u32,
    properties: Vec<PropertySchema>,
}

impl TypeSchemaBuilder {
    #[must_use]
    pub fn class_version(mut self, version: u32) -> Self {
        self.class_version = version;
        self
    }

    #[must_use]
    pub fn property(mut self, property: PropertySchema) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn simple(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.property(PropertySchema::new(name, PropertyKind::Simple, type_name))
    }

    #[must_use]
    pub fn complex(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.property(PropertySchema::new(name, PropertyKind::Complex, type_name))
    }

    #[must_use]
    pub fn list(self, name: impl Into<String>, element_type: impl Into<String>) -> Self {
        self.property(PropertySchema::new(name, PropertyKind::List, element_type))
    }

    #[must_use]
    pub fn set(self, name: impl Into<String>, element_type: impl Into<String>) -> Self {
        self.property(PropertySchema::new(name, PropertyKind::Set, element_type))
    }

    #[must_use]
    pub fn map(self, name: impl Into<String>, value_type: impl Into<String>) -> Self {
        self.property(PropertySchema::new(name, PropertyKind::Map, value_type))
    }

    /// A simple property holding the scope path of another configuration.
    #[must_use]
    pub fn reference(self, name: impl Into<String>, target_type: impl Into<String>) -> Self {
        let mut property = PropertySchema::new(name, PropertyKind::Simple, "scope_path");
        property.references = Some(target_type.into());
        self.property(property)
    }

    #[must_use]
    pub fn merge_with(mut self, strategy: impl Into<String>) -> Self {
        if let Some(last) = self.properties.last_mut() {
            last.merge_strategy = Some(strategy.into());
        }
        self
    }

    #[must_use]
    pub fn on_stale(mut self, policy: StalenessPolicy) -> Self {
        if let Some(last) = self.properties.last_mut() {
            last.staleness = Some(policy);
        }
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::DuplicateProperty`] if a property name is declared twice.
    pub fn build(self) -> Result<TypeSchema> {
        let mut seen = HashSet::new();
        for property in &self.properties {
            if !seen.insert(property.name.as_str()) {
                return Err(Error::DuplicateProperty {
                    type_name: self.name.clone(),
                    property: property.name.clone(),
                });
            }
        }
        Ok(TypeSchema {
            name: self.name,
            class_version: self.class_version,
            properties: self.properties,
        })
    }
}

/// All schemas known to a service, root and nested types alike.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, TypeSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, returning the one it replaced.
    pub fn register(&mut self, schema: TypeSchema) -> Option<TypeSchema> {
        self.types.insert(schema.name.clone(), schema)
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeSchema> {
        self.types.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn property(&self, type_name: &str, property: &str) -> Option<&PropertySchema> {
        self.get(type_name)?.property(property)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeSchema> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
