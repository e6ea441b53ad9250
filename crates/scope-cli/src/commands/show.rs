//! Effective configuration display

use colored::Colorize;
use scope_core::ConfigService;
use scope_model::{ConfigKey, ScopePath};

use crate::error::{CliError, Result};
use crate::render;

/// Display the effective configuration of `type_name` at `path`
pub fn run_show(service: &ConfigService, type_name: &str, path: &ScopePath, json: bool) -> Result<()> {
    let key = ConfigKey::new(type_name, path.clone());
    let resolved = service.resolve(&key)?;

    if json {
        let chain: Vec<_> = resolved
            .chain
            .iter()
            .map(|tree| {
                serde_json::json!({
                    "path": tree.defining_scope_path().to_string(),
                    "version": tree.version(),
                    "class_version": tree.class_version(),
                })
            })
            .collect();
        let output = serde_json::json!({
            "type": type_name,
            "path": path.to_string(),
            "chain": chain,
            "values": render::to_json(resolved.effective.root()),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("{}", key.to_string().bold());
    println!();

    if resolved.chain.is_empty() {
        println!("  {:<10} {}", "Chain:".dimmed(), "(none)".dimmed());
    } else {
        println!("  {}:", "Chain".dimmed());
        for tree in &resolved.chain {
            println!(
                "    {} {} {}",
                "+".green(),
                tree.defining_scope_path(),
                format!("v{}", tree.version()).dimmed()
            );
        }
    }
    println!();

    let lines = render::flatten(resolved.effective.root());
    if lines.is_empty() {
        println!("  {:<10} {}", "Values:".dimmed(), "(none)".dimmed());
    } else {
        println!("  {}:", "Values".dimmed());
        for (property, value) in lines {
            println!("    {} = {}", property.cyan(), value);
        }
    }

    Ok(())
}

/// Print the effective value of one property
pub fn run_get(service: &ConfigService, type_name: &str, path: &ScopePath, property: &str) -> Result<()> {
    let key = ConfigKey::new(type_name, path.clone());
    let resolved = service.resolve(&key)?;
    let value = resolved.effective.get(property).ok_or_else(|| {
        CliError::user(format!("Property '{property}' is not set for {key}"))
    })?;

    match render::property_to_json(value) {
        serde_json::Value::String(s) => println!("{s}"),
        serde_json::Value::Null => println!("null"),
        other => println!(
            "{}",
            serde_json::to_string_pretty(&other).unwrap_or_default()
        ),
    }
    Ok(())
}
