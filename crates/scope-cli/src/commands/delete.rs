//! Snapshot deletion

use colored::Colorize;
use scope_core::ConfigService;
use scope_model::{ConfigKey, ScopePath};

use crate::error::Result;

pub fn run_delete(
    service: &ConfigService,
    type_name: &str,
    path: &ScopePath,
    children: bool,
) -> Result<()> {
    let key = ConfigKey::new(type_name, path.clone());
    let removed = service.delete(&key, children)?;
    if removed == 0 {
        println!("{} Nothing stored at {}", "=".dimmed(), key);
    } else {
        println!(
            "{} Deleted {} snapshot{}",
            "-".red(),
            removed,
            if removed == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
