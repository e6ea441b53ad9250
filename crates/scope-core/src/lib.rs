//! Resolution engine for scope-addressed configuration
//!
//! This crate ties the tree model and the storage backends together,
//! implementing:
//!
//! - **Hierarchical merge**: effective values computed from every snapshot
//!   along a scope path, with per-property merge strategies
//! - **Schema migration**: class version upgrades applied on load through a
//!   graph of registered transformers
//! - **Save reconciliation**: optimistic versioning with per-property conflict
//!   detection and staleness policies
//! - **Typed binding**: serde types decoded from effective trees, with dirty
//!   tracking so only edited properties are persisted
//!
//! # Architecture
//!
//! ```text
//!                 CLI / application
//!                        |
//!                   scope-core
//!                        |
//!              +---------+---------+
//!              |                   |
//!         scope-model         scope-store
//! ```
//!
//! # Example
//!
//! ```ignore
//! use scope_core::ConfigService;
//! use scope_store::MemoryStorage;
//! use std::sync::Arc;
//!
//! let service = ConfigService::builder(Arc::new(MemoryStorage::new()))
//!     .configuration::<AppConfig>()?
//!     .build()?;
//! let mut app = service.load::<AppConfig>(&"global/user[id=alice]".parse()?)?;
//! app.set("theme", "dark")?;
//! service.save_bound(&mut app)?;
//! ```

pub mod binding;
pub mod cache;
pub mod codec;
pub mod error;
pub mod locks;
pub mod logging;
pub mod merge;
pub mod migration;
pub mod reconcile;
pub mod references;
pub mod service;
pub mod settings;
pub mod strategy;

pub use binding::{Bound, Configuration, Handle};
pub use cache::{CacheStats, ConfigCache, DEFAULT_CAPACITY};
pub use codec::TreeCodec;
pub use error::{Error, Result};
pub use locks::KeyedLocks;
pub use merge::MergeEngine;
pub use migration::{
    MigrationEdge, MigrationRegistry, MigrationResolver, TransformError, TransformResult,
    Transformer, TreeEditor,
};
pub use reconcile::{Reconciliation, ResolvedConflict, SaveOutcome, VersionReconciler};
pub use references::{ReferenceEdge, ReferenceGraph};
pub use service::{ConfigService, ConfigServiceBuilder, Resolved, SaveReport};
pub use settings::{Backend, CacheSettings, Settings, StorageSettings};
pub use strategy::{
    ChildOverwrites, DefaultPolicies, KeepParent, MergeStrategy, ParentFalseWins,
    PredicateStrategy, Resolution, SchemaPolicies, StrategyLookup, StrategyRegistry,
};
