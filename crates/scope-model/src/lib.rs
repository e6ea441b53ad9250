//! Scope addressing and configuration tree model
//!
//! This crate is the bottom layer of the workspace. It defines:
//!
//! - [`Scope`] and [`ScopePath`]: the addressing primitive. A path is a
//!   root-first sequence of scopes such as `global/tenant[id=acme]/user[id=alice]`.
//! - [`ConfigTree`]: the versioned snapshot of one configuration object at one
//!   scope path, with simple, complex, list, set and map children.
//! - [`TypeSchema`]: the explicit schema descriptor carrying merge strategy and
//!   staleness policy metadata per property.
//!
//! Nothing here performs I/O; storage lives in `scope-store` and the
//! resolution engine in `scope-core`.

pub mod error;
pub mod path;
pub mod schema;
pub mod scope;
pub mod tree;

pub use error::{Error, Result};
pub use path::{ConfigKey, ScopePath};
pub use schema::{PropertySchema, SchemaRegistry, StalenessPolicy, TypeSchema, TypeSchemaBuilder};
pub use scope::{Scope, ScopeDefinition, ScopeRegistry};
pub use tree::{
    Collection, ComplexNode, ComplexNodeBuilder, ConfigTree, Element, MapNode, NodeMeta, Property,
    PropertyKind, SimpleValue,
};
