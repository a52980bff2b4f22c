//! Shared utilities for command implementations
//!
//! This module contains:
//! - `load_config` - Resolve the config file (explicit, override, built-in)
//! - `read_table` / `write_table` - CSV file I/O with path context
//! - `catering_client` - Build the catering API client from the environment
//! - `parse_date` - Parse a YYYY-MM-DD flag value

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use boxrecon_core::{CateringApi, CateringClient, RawTable, ReconConfig};
use chrono::NaiveDate;
use tracing::debug;

pub fn load_config(path: Option<&Path>) -> Result<ReconConfig> {
    let config = ReconConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load config".to_string(),
    })?;
    debug!(explicit = path.is_some(), "Loaded config");
    Ok(config)
}

pub fn read_table(path: &Path) -> Result<RawTable> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    RawTable::from_csv(file).with_context(|| format!("Failed to parse CSV: {}", path.display()))
}

pub fn write_table(table: &RawTable, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    table
        .write_csv(file)
        .with_context(|| format!("Failed to write CSV: {}", path.display()))
}

/// Build the catering API client from `BOXRECON_*` environment variables
pub fn catering_client(config: &ReconConfig) -> Result<CateringClient> {
    let client = CateringClient::from_env(&config.api).context(
        "Catering API not configured. Set BOXRECON_CLIENT_ID and BOXRECON_CLIENT_SECRET, \
         plus BOXRECON_API_URL or api.base_url in the config \
         (or BOXRECON_API_BACKEND=mock for offline runs)",
    )?;
    debug!(url = %client.base_url(), "Using catering API");
    Ok(client)
}

pub fn parse_date(value: &str, flag: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid {} date format (use YYYY-MM-DD): {}", flag, value))
}
