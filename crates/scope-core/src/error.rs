//! Error types for scope-core

use crate::migration::TransformError;
use scope_model::ScopePath;
use std::path::PathBuf;

/// Result type for scope-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, merging, migrating or saving
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Ancestor and descendant snapshots disagree on the type of a property
    #[error("Type mismatch at '{property}': ancestor has {parent}, descendant has {child}")]
    TypeMismatch {
        property: String,
        parent: String,
        child: String,
    },

    /// A save found a concurrent edit on a property without a staleness policy
    #[error(
        "Unresolved conflict at {scope_path} on '{property}': persisted {persisted}, local {local}"
    )]
    ConflictUnresolved {
        scope_path: ScopePath,
        property: String,
        persisted: String,
        local: String,
    },

    #[error("No migration path for {type_name} from class version {from} to {to}")]
    MigrationNotFound { type_name: String, from: u32, to: u32 },

    #[error("Migration of {type_name} from class version {from} to {to} failed: {source}")]
    TransformFailed {
        type_name: String,
        from: u32,
        to: u32,
        #[source]
        source: TransformError,
    },

    /// Migration edges must go from an older to a newer class version
    #[error("Invalid migration edge for {type_name}: {from} -> {to}")]
    InvalidMigrationEdge { type_name: String, from: u32, to: u32 },

    #[error("Unknown configuration type: {0}")]
    UnknownType(String),

    #[error("Unknown merge strategy '{strategy}' on {type_name}.{property}")]
    UnknownStrategy {
        type_name: String,
        property: String,
        strategy: String,
    },

    #[error("Cannot merge an empty snapshot chain")]
    EmptyChain,

    /// Conversion between a typed value and its tree failed
    #[error("Binding error for {type_name}: {message}")]
    Binding { type_name: String, message: String },

    #[error("Invalid settings: {message}")]
    Settings { message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Transparent wrappers for underlying crate errors
    /// Validation error from scope-model
    #[error(transparent)]
    Model(#[from] scope_model::Error),

    /// Storage error from scope-store
    #[error(transparent)]
    Storage(#[from] scope_store::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn binding(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Binding {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Whether the save lost an optimistic versioning race and may be retried
    /// after reloading.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_stale())
    }

    /// Whether the error is a validation failure that retrying cannot fix.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Model(_))
    }
}
