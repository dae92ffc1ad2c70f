//! Configuration view and validation commands: `desk config`.

use std::path::Path;

use anyhow::{Context, Result};

use super::super::ConfigCommands;
use servicedesk::config::{CONFIG_FILE, DESK_DIR, DeskConfig};

pub fn cmd_config(
    config: &DeskConfig,
    config_path: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let default_path = Path::new(DESK_DIR).join(CONFIG_FILE);
    let path = config_path.unwrap_or(&default_path);

    match command {
        None | Some(ConfigCommands::Show) => {
            if path.exists() {
                println!("# Config file: {}", path.display());
            } else {
                println!("# No config file at {}, using defaults", path.display());
            }
            println!("# Effective values (with env overrides):");
            println!();
            let mut shown = config.clone();
            if shown.tracker.token.is_some() {
                shown.tracker.token = Some("********".to_string());
            }
            print!(
                "{}",
                toml::to_string_pretty(&shown).context("Failed to render configuration")?
            );
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init) => {
            if path.exists() {
                println!("{} already exists, leaving it untouched.", path.display());
                return Ok(());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let content = toml::to_string_pretty(&DeskConfig::default())
                .context("Failed to render default configuration")?;
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Created {}", path.display());
        }
    }
    Ok(())
}
