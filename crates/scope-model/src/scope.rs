//! Scopes: the named, keyed levels a configuration can be defined at

use crate::{Error, Result, ScopePath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Characters with structural meaning in the textual scope path form.
const RESERVED_CHARS: &[char] = &['/', '[', ']', '=', ','];

/// A named addressing level such as `global`, `tenant[id=acme]` or `user[id=alice]`.
///
/// Two scopes are equal when both name and properties are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawScope")]
pub struct Scope {
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, String>,
}

impl Scope {
    /// Create a scope with the given properties.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidScope`] if the name or a property key is empty,
    /// or if the name, a key or a value contains one of `/ [ ] = ,`. Values
    /// must also be free of surrounding whitespace so the textual form parses
    /// back to the same scope.
    pub fn new<I, K, V>(name: impl Into<String>, properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_scope(name, "scope name must not be empty"));
        }
        if name.contains(RESERVED_CHARS) {
            return Err(Error::invalid_scope(
                name,
                "scope name must not contain '/', '[', ']', '=' or ','",
            ));
        }

        let mut props = BTreeMap::new();
        for (key, value) in properties {
            let key = key.into();
            if key.trim().is_empty() {
                return Err(Error::invalid_scope(name, "property keys must not be empty"));
            }
            let value = value.into();
            if key.contains(RESERVED_CHARS) || value.contains(RESERVED_CHARS) {
                return Err(Error::invalid_scope(
                    name,
                    format!("property '{key}' must not contain '/', '[', ']', '=' or ','"),
                ));
            }
            if key.trim() != key || value.trim() != value {
                return Err(Error::invalid_scope(
                    name,
                    format!("property '{key}' must not have surrounding whitespace"),
                ));
            }
            props.insert(key, value);
        }

        Ok(Self {
            name,
            properties: props,
        })
    }

    /// Create a scope without properties, e.g. `global`.
    pub fn named(name: impl Into<String>) -> Result<Self> {
        Self::new(name, std::iter::empty::<(String, String)>())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Whether every given key/value pair is present on this scope.
    pub fn contains_all(&self, properties: &BTreeMap<String, String>) -> bool {
        properties
            .iter()
            .all(|(k, v)| self.properties.get(k) == Some(v))
    }
}

/// Unvalidated serde form of [`Scope`].
#[derive(Deserialize)]
struct RawScope {
    name: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

impl TryFrom<RawScope> for Scope {
    type Error = Error;

    fn try_from(raw: RawScope) -> Result<Self> {
        Scope::new(raw.name, raw.properties)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.properties.is_empty() {
            let pairs: Vec<String> = self
                .properties
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, "[{}]", pairs.join(","))?;
        }
        Ok(())
    }
}

/// Declaration of a scope level and the properties it must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDefinition {
    pub name: String,
    pub required_properties: BTreeSet<String>,
}

impl ScopeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_properties: BTreeSet::new(),
        }
    }

    /// Declare a mandatory property key.
    #[must_use]
    pub fn require(mut self, property: impl Into<String>) -> Self {
        self.required_properties.insert(property.into());
        self
    }
}

/// Registry of declared scope levels.
///
/// Paths that use a declared scope must carry all of its mandatory
/// properties. Undeclared scopes are accepted as-is.
#[derive(Debug, Clone, Default)]
pub struct ScopeRegistry {
    definitions: HashMap<String, ScopeDefinition>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scope definition, replacing any previous one of that name.
    pub fn register(&mut self, definition: ScopeDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&ScopeDefinition> {
        self.definitions.get(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Check every scope of `path` against its definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingScopeProperty`] for the first missing property.
    pub fn validate(&self, path: &ScopePath) -> Result<()> {
        for scope in path.scopes() {
            let Some(definition) = self.definitions.get(scope.name()) else {
                continue;
            };
            for required in &definition.required_properties {
                if scope.property(required).is_none() {
                    return Err(Error::MissingScopeProperty {
                        scope: scope.name().to_string(),
                        property: required.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
