//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use scope_model::ScopePath;
use scope_store::StorageFormat;
use std::path::PathBuf;

/// Inspect and edit a file-backed scoped configuration store
#[derive(Parser, Debug)]
#[command(name = "scopecfg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Store directory (defaults to the user data directory)
    #[arg(long, global = true, env = "SCOPECFG_STORE")]
    pub store: Option<PathBuf>,

    /// Snapshot file format
    #[arg(long, global = true, value_enum)]
    pub format: Option<FormatArg>,

    /// Settings file; `--store` and `--format` override its storage section
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show the effective configuration at a scope path
    ///
    /// Examples:
    ///   scopecfg show App global/user[id=alice]
    ///   scopecfg show App global --json
    Show {
        /// Configuration type name
        type_name: String,

        /// Scope path, e.g. global/tenant[id=acme]
        path: ScopePath,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Print one effective property value
    Get {
        type_name: String,
        path: ScopePath,

        /// Dotted property path, e.g. database.port
        property: String,
    },

    /// Set a simple property in the snapshot at a scope path
    Set {
        type_name: String,
        path: ScopePath,

        /// Dotted property path. Complex properties along the path must
        /// already exist in the effective configuration.
        property: String,

        /// New value; omit to store an explicit null
        value: Option<String>,

        /// Declared value type; defaults to the current type of the
        /// property, or `string` for a new one
        #[arg(long = "type")]
        value_type: Option<String>,
    },

    /// List stored scope paths containing a scope
    Scopes {
        type_name: String,

        /// Scope name to look for, e.g. user
        scope_name: String,

        /// Required scope property, as key=value (repeatable)
        #[arg(long = "where", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
    },

    /// Delete the snapshot at a scope path
    Delete {
        type_name: String,
        path: ScopePath,

        /// Also delete every snapshot below the path
        #[arg(long)]
        children: bool,
    },
}

/// Snapshot file formats accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Json,
    Toml,
    Yaml,
}

impl From<FormatArg> for StorageFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Json => StorageFormat::Json,
            FormatArg::Toml => StorageFormat::Toml,
            FormatArg::Yaml => StorageFormat::Yaml,
        }
    }
}

fn parse_key_value(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{input}'")),
    }
}
