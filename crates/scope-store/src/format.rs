//! Format-agnostic snapshot marshalling

use crate::{Error, Result};
use scope_model::ConfigTree;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// On-disk encoding of snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    #[default]
    Json,
    Toml,
    Yaml,
}

impl StorageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
        }
    }

    /// Detect the format from a file extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn encode(&self, tree: &ConfigTree) -> Result<String> {
        let serialized = match self {
            Self::Json => serde_json::to_string_pretty(tree).map_err(|e| e.to_string()),
            Self::Toml => toml::to_string_pretty(tree).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::to_string(tree).map_err(|e| e.to_string()),
        };
        serialized.map_err(|message| Error::Serialize {
            key: tree.key(),
            format: self.to_string(),
            message,
        })
    }

    pub fn decode(&self, content: &str, path: &Path) -> Result<ConfigTree> {
        let parsed = match self {
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| Error::Parse {
            path: path.to_path_buf(),
            format: self.to_string(),
            message,
        })
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "JSON",
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
        };
        f.write_str(s)
    }
}

impl FromStr for StorageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s).ok_or_else(|| Error::UnsupportedFormat(s.to_string()))
    }
}
