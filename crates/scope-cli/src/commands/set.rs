//! Simple property edits

use colored::Colorize;
use scope_core::{ConfigService, SaveOutcome};
use scope_model::{ConfigKey, Property, ScopePath};

use crate::error::Result;

const DEFAULT_VALUE_TYPE: &str = "string";

/// Set a simple property at `path` and save through the reconciler
///
/// Without an explicit `value_type` the property keeps the type it already
/// has in the effective configuration.
pub fn run_set(
    service: &ConfigService,
    type_name: &str,
    path: &ScopePath,
    property: &str,
    value: Option<&str>,
    value_type: Option<&str>,
) -> Result<()> {
    let key = ConfigKey::new(type_name, path.clone());
    let resolved = service.resolve(&key)?;

    let mut local = resolved.effective.clone();
    let template = local.root().clone();
    let value_type = value_type
        .or_else(|| {
            template
                .property_at(property)
                .and_then(Property::as_simple)
                .map(|simple| simple.meta.property_type.as_str())
        })
        .unwrap_or(DEFAULT_VALUE_TYPE);
    tracing::debug!(%key, property, value_type, "Setting property");
    let new_value = Property::simple(value_type, value.map(str::to_string));
    local
        .root_mut()
        .replace_at(property, Some(new_value), &template)?;

    let report = service.save(&local, &resolved.chain)?;
    for conflict in &report.resolved {
        println!(
            "{} {} kept {} ({:?})",
            "!".yellow(),
            conflict.property,
            conflict.persisted,
            conflict.policy
        );
    }
    match report.outcome {
        SaveOutcome::Create => println!(
            "{} Created {} v{}",
            "+".green(),
            key,
            report.tree.version()
        ),
        SaveOutcome::Update => println!(
            "{} Updated {} to v{}",
            "~".green(),
            key,
            report.tree.version()
        ),
        SaveOutcome::Unchanged => println!("{} {} is unchanged", "=".dimmed(), key),
    }
    Ok(())
}
