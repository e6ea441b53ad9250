//! Scoped configuration CLI
//!
//! Inspects and edits a file-backed store of scope-addressed configuration
//! snapshots.

mod cli;
mod commands;
mod error;
mod render;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use commands::StoreOptions;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        scope_core::logging::init("debug").map_err(|e| CliError::user(e.to_string()))?;
        tracing::debug!("Verbose mode enabled");
    }

    let options = StoreOptions {
        store: cli.store,
        format: cli.format.map(Into::into),
        config: cli.config,
    };

    match cli.command {
        Some(cmd) => execute_command(cmd, &options),
        None => {
            println!(
                "{} Scoped configuration CLI",
                "scopecfg".green().bold()
            );
            println!();
            println!("Run {} for available commands.", "scopecfg --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(cmd: Commands, options: &StoreOptions) -> Result<()> {
    let service = options.open()?;
    match cmd {
        Commands::Show {
            type_name,
            path,
            json,
        } => commands::run_show(&service, &type_name, &path, json),
        Commands::Get {
            type_name,
            path,
            property,
        } => commands::run_get(&service, &type_name, &path, &property),
        Commands::Set {
            type_name,
            path,
            property,
            value,
            value_type,
        } => commands::run_set(
            &service,
            &type_name,
            &path,
            &property,
            value.as_deref(),
            value_type.as_deref(),
        ),
        Commands::Scopes {
            type_name,
            scope_name,
            filters,
        } => commands::run_scopes(&service, &type_name, &scope_name, &filters),
        Commands::Delete {
            type_name,
            path,
            children,
        } => commands::run_delete(&service, &type_name, &path, children),
    }
}
