//! Per-property merge strategies
//!
//! When an ancestor snapshot and a descendant snapshot both define a simple
//! property, the property's strategy decides which value survives. Strategies
//! are registered by name and referenced from the schema descriptor:
//!
//! ```
//! use scope_core::strategy::{MergeStrategy, Resolution, StrategyRegistry};
//!
//! let registry = StrategyRegistry::with_defaults();
//! let strategy = registry.get("parent_false_wins").unwrap();
//!
//! // An administrator's explicit "false" beats the user's override.
//! assert_eq!(strategy.resolve(Some("false"), Some("true")), Resolution::KeepParent);
//! assert_eq!(strategy.resolve(Some("true"), Some("false")), Resolution::TakeChild);
//! ```

use crate::{Error, Result};
use scope_model::{SchemaRegistry, StalenessPolicy, TypeSchema};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const CHILD_OVERWRITES: &str = "child_overwrites";
pub const KEEP_PARENT: &str = "keep_parent";
pub const PARENT_FALSE_WINS: &str = "parent_false_wins";

/// Outcome of resolving one simple property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    KeepParent,
    TakeChild,
    /// A value derived from both sides.
    Computed(Option<String>),
}

/// Decides the effective value of a simple property defined at two scope levels.
///
/// Values are the serialized strings of the nodes; `None` is an explicit null.
pub trait MergeStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn resolve(&self, parent: Option<&str>, child: Option<&str>) -> Resolution;
}

/// The descendant's value always wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildOverwrites;

impl MergeStrategy for ChildOverwrites {
    fn name(&self) -> &str {
        CHILD_OVERWRITES
    }

    fn resolve(&self, _parent: Option<&str>, _child: Option<&str>) -> Resolution {
        Resolution::TakeChild
    }
}

/// The ancestor's value always wins; descendants cannot override it.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepParent;

impl MergeStrategy for KeepParent {
    fn name(&self) -> &str {
        KEEP_PARENT
    }

    fn resolve(&self, _parent: Option<&str>, _child: Option<&str>) -> Resolution {
        Resolution::KeepParent
    }
}

/// Keep the descendant's value unless the ancestor explicitly set `"false"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParentFalseWins;

impl MergeStrategy for ParentFalseWins {
    fn name(&self) -> &str {
        PARENT_FALSE_WINS
    }

    fn resolve(&self, parent: Option<&str>, _child: Option<&str>) -> Resolution {
        if parent == Some("false") {
            Resolution::KeepParent
        } else {
            Resolution::TakeChild
        }
    }
}

type Predicate = dyn Fn(Option<&str>, Option<&str>) -> bool + Send + Sync;

/// A named strategy backed by a closure. The closure returns `true` to take
/// the descendant's value and `false` to keep the ancestor's.
#[derive(Clone)]
pub struct PredicateStrategy {
    name: String,
    predicate: Arc<Predicate>,
}

impl PredicateStrategy {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Option<&str>, Option<&str>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for PredicateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateStrategy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl MergeStrategy for PredicateStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, parent: Option<&str>, child: Option<&str>) -> Resolution {
        if (self.predicate)(parent, child) {
            Resolution::TakeChild
        } else {
            Resolution::KeepParent
        }
    }
}

/// Strategies by name.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn MergeStrategy>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl StrategyRegistry {
    /// An empty registry. Lookups of the default strategy still succeed.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// A registry holding the built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(ChildOverwrites);
        registry.register(KeepParent);
        registry.register(ParentFalseWins);
        registry
    }

    /// Register a strategy under its own name, replacing any previous one.
    pub fn register(&mut self, strategy: impl MergeStrategy + 'static) {
        self.strategies
            .insert(strategy.name().to_string(), Arc::new(strategy));
    }

    pub fn get(&self, name: &str) -> Option<&dyn MergeStrategy> {
        self.strategies.get(name).map(|s| s.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Check that every strategy `schema` names is registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStrategy`] for the first unregistered name.
    pub fn validate(&self, schema: &TypeSchema) -> Result<()> {
        for property in schema.properties() {
            if let Some(strategy) = &property.merge_strategy
                && !self.contains(strategy)
            {
                return Err(Error::UnknownStrategy {
                    type_name: schema.name().to_string(),
                    property: property.name.clone(),
                    strategy: strategy.clone(),
                });
            }
        }
        Ok(())
    }
}

static DEFAULT_STRATEGY: ChildOverwrites = ChildOverwrites;

/// Per-property policy lookup used by the merge engine and the reconciler.
///
/// `owner_type` is the type of the complex node holding the property.
pub trait StrategyLookup {
    fn strategy_for(&self, owner_type: &str, property: &str) -> &dyn MergeStrategy;

    fn staleness_policy(&self, owner_type: &str, property: &str) -> Option<StalenessPolicy>;
}

/// Child overwrites everywhere; conflicts are never auto-resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicies;

impl StrategyLookup for DefaultPolicies {
    fn strategy_for(&self, _owner_type: &str, _property: &str) -> &dyn MergeStrategy {
        &DEFAULT_STRATEGY
    }

    fn staleness_policy(&self, _owner_type: &str, _property: &str) -> Option<StalenessPolicy> {
        None
    }
}

/// Policies read from registered schemas.
#[derive(Debug, Clone, Copy)]
pub struct SchemaPolicies<'a> {
    schemas: &'a SchemaRegistry,
    strategies: &'a StrategyRegistry,
}

impl<'a> SchemaPolicies<'a> {
    pub fn new(schemas: &'a SchemaRegistry, strategies: &'a StrategyRegistry) -> Self {
        Self {
            schemas,
            strategies,
        }
    }
}

impl StrategyLookup for SchemaPolicies<'_> {
    fn strategy_for(&self, owner_type: &str, property: &str) -> &dyn MergeStrategy {
        let Some(name) = self
            .schemas
            .property(owner_type, property)
            .and_then(|p| p.merge_strategy.as_deref())
        else {
            return &DEFAULT_STRATEGY;
        };
        match self.strategies.get(name) {
            Some(strategy) => strategy,
            None => {
                tracing::warn!(
                    owner_type,
                    property,
                    strategy = name,
                    "Unregistered merge strategy, falling back to child overwrites"
                );
                &DEFAULT_STRATEGY
            }
        }
    }

    fn staleness_policy(&self, owner_type: &str, property: &str) -> Option<StalenessPolicy> {
        self.schemas
            .property(owner_type, property)
            .and_then(|p| p.staleness)
    }
}
