//! Help command - lists commands and the effective configuration.

use anyhow::{Context, Result};

use crate::commands::Command;
use crate::config::Config;

/// Execute the help command.
pub fn cmd_help(config: &Config, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("Usage: shipwright [OPTIONS] <COMMAND> [KEY=VALUE]...\n");
    println!("Commands:");
    for command in Command::ALL {
        println!("  {:<29} {}", command.name(), command.description());
    }
    println!();
    config.print();
    println!();
    println!("Override any key with KEY=VALUE arguments or environment variables.");
    Ok(())
}
