//! Stored scope listing

use colored::Colorize;
use scope_core::ConfigService;
use std::collections::BTreeMap;

use crate::error::Result;

/// List stored paths of `type_name` that contain a `scope_name` scope
/// carrying every filter property
pub fn run_scopes(
    service: &ConfigService,
    type_name: &str,
    scope_name: &str,
    filters: &[(String, String)],
) -> Result<()> {
    let properties: BTreeMap<String, String> = filters.iter().cloned().collect();
    let paths = service.list_scopes(type_name, scope_name, &properties)?;

    if paths.is_empty() {
        println!("{}", "(none)".dimmed());
        return Ok(());
    }
    for path in paths {
        println!("{path}");
    }
    Ok(())
}
