//! Command implementations for scopecfg

pub mod delete;
pub mod scopes;
pub mod set;
pub mod show;

pub use delete::run_delete;
pub use scopes::run_scopes;
pub use set::run_set;
pub use show::{run_get, run_show};

use crate::error::{CliError, Result};
use scope_core::{Backend, ConfigService, Settings};
use scope_store::StorageFormat;
use std::path::PathBuf;

/// Directory name of the default store under the user data directory
const DEFAULT_STORE_DIR: &str = "scopecfg";

/// Where the store lives, as given on the command line
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub store: Option<PathBuf>,
    pub format: Option<StorageFormat>,
    pub config: Option<PathBuf>,
}

impl StoreOptions {
    /// Merge the settings file (if any) with command-line overrides. The CLI
    /// always uses the file backend.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        let directory = match (&self.store, &settings.storage.directory) {
            (Some(store), _) => store.clone(),
            (None, Some(directory)) => directory.clone(),
            (None, None) => default_store_dir()?,
        };
        settings.storage.backend = Backend::File;
        settings.storage.directory = Some(directory);
        if let Some(format) = self.format {
            settings.storage.format = format;
        }
        Ok(settings)
    }

    /// A service over the configured store. No schemas are registered, so
    /// every property merges with the default strategy and no migration runs.
    pub fn open(&self) -> Result<ConfigService> {
        let settings = self.settings()?;
        tracing::debug!(
            directory = ?settings.storage.directory,
            format = ?settings.storage.format,
            "Opening store"
        );
        Ok(ConfigService::from_settings(&settings)?.build()?)
    }
}

fn default_store_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(DEFAULT_STORE_DIR))
        .ok_or_else(|| CliError::user("Cannot determine a data directory; pass --store"))
}
