//! Service settings loaded from TOML
//!
//! ```toml
//! [cache]
//! capacity = 400
//!
//! [storage]
//! backend = "file"
//! directory = "/var/lib/app/config"
//! format = "yaml"
//! ```
//!
//! Every section and key is optional.

use crate::cache::DEFAULT_CAPACITY;
use crate::{Error, Result};
use scope_store::{ConfigStorage, FileStorage, MemoryStorage, StorageFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of cached snapshots.
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: Backend,
    /// Root directory of the file backend.
    pub directory: Option<PathBuf>,
    pub format: StorageFormat,
}

impl Settings {
    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(Error::Settings {
                message: "cache.capacity must be at least 1".to_string(),
            });
        }
        if self.storage.backend == Backend::File && self.storage.directory.is_none() {
            return Err(Error::Settings {
                message: "storage.directory is required for the file backend".to_string(),
            });
        }
        Ok(())
    }

    /// Construct the configured storage backend.
    pub fn open_storage(&self) -> Result<Arc<dyn ConfigStorage>> {
        self.validate()?;
        match (&self.storage.backend, &self.storage.directory) {
            (Backend::File, Some(directory)) => Ok(Arc::new(FileStorage::new(
                directory.clone(),
                self.storage.format,
            ))),
            _ => Ok(Arc::new(MemoryStorage::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.cache.capacity, 400);
        assert_eq!(settings.storage.backend, Backend::Memory);
    }

    #[test]
    fn full_document() {
        let settings = Settings::from_toml_str(
            r#"
            [cache]
            capacity = 16

            [storage]
            backend = "file"
            directory = "/tmp/store"
            format = "toml"
            "#,
        )
        .unwrap();

        assert_eq!(settings.cache.capacity, 16);
        assert_eq!(settings.storage.backend, Backend::File);
        assert_eq!(settings.storage.directory, Some(PathBuf::from("/tmp/store")));
        assert_eq!(settings.storage.format, StorageFormat::Toml);
    }

    #[test]
    fn file_backend_requires_directory() {
        let err = Settings::from_toml_str("[storage]\nbackend = \"file\"").unwrap_err();
        assert!(matches!(err, Error::Settings { .. }));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(Settings::from_toml_str("[cache]\ncapacity = 0").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[cache]\ncapacity = 2\n").unwrap();
        assert_eq!(Settings::load(&path).unwrap().cache.capacity, 2);
        assert!(Settings::load(&dir.path().join("missing.toml")).is_err());
    }
}
