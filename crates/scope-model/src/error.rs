//! Error types for scope-model

/// Result type for scope-model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Validation errors raised while building scopes, paths and schemas.
///
/// These are never retried: they describe malformed input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Invalid scope '{name}': {reason}")]
    InvalidScope { name: String, reason: String },

    #[error("A scope path must contain at least one scope")]
    EmptyScopePath,

    #[error("Cannot parse scope path '{input}': {reason}")]
    InvalidScopePath { input: String, reason: String },

    #[error("Scope '{scope}' requires property '{property}'")]
    MissingScopeProperty { scope: String, property: String },

    #[error("Property '{property}' is declared twice on type '{type_name}'")]
    DuplicateProperty { type_name: String, property: String },

    #[error("Invalid property path '{path}'")]
    InvalidPropertyPath { path: String },
}

impl Error {
    pub fn invalid_scope(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScope {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_path(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScopePath {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
