//! Error types for scope-store

use scope_model::ConfigKey;
use std::path::PathBuf;

/// Result type for scope-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in storage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Optimistic versioning rejected a write. Reload and reapply to retry.
    #[error("Stale configuration {key}: {reason}")]
    StaleConfig { key: ConfigKey, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} snapshot at {path}: {message}")]
    Parse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Failed to serialize {format} snapshot for {key}: {message}")]
    Serialize {
        key: ConfigKey,
        format: String,
        message: String,
    },

    #[error("Unsupported storage format: {0}")]
    UnsupportedFormat(String),

    #[error("Snapshot at {path} belongs to {found}, expected {expected}")]
    KeyMismatch {
        path: PathBuf,
        expected: ConfigKey,
        found: ConfigKey,
    },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn stale(key: &ConfigKey, reason: impl Into<String>) -> Self {
        Self::StaleConfig {
            key: key.clone(),
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry after reloading.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleConfig { .. })
    }
}
