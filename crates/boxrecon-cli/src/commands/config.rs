//! Config command implementations

use std::path::Path;

use anyhow::{Context, Result};
use boxrecon_core::config::default_config_path;

use super::load_config;

pub fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    let toml = config.to_toml().context("Failed to serialize config")?;
    print!("{}", toml);
    Ok(())
}

pub fn cmd_config_path() -> Result<()> {
    match default_config_path() {
        Some(path) if path.exists() => {
            println!("{}", path.display());
        }
        Some(path) => {
            println!("{}", path.display());
            println!("   (not present; using built-in defaults)");
        }
        None => {
            anyhow::bail!("Could not determine a data directory for this platform");
        }
    }
    Ok(())
}
