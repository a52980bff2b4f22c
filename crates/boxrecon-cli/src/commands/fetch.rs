//! Fetch command implementation

use std::path::Path;

use anyhow::{Context, Result};
use boxrecon_core::{fetch_range, CateringApi, FetchFailure, ReconConfig};
use chrono::NaiveDate;

use super::write_table;

pub async fn cmd_fetch<A: CateringApi + ?Sized>(
    config: &ReconConfig,
    client: &A,
    from: NaiveDate,
    to: NaiveDate,
    output: &Path,
) -> Result<()> {
    println!(
        "📡 Fetching catering orders {} to {} from {}...",
        from,
        to,
        client.base_url()
    );

    let report = fetch_range(client, from, to, &config.columns.api)
        .await
        .context("Failed to list events")?;

    write_table(&report.table, output)?;

    println!();
    println!("   Events:      {}", report.events);
    println!("   Line items:  {}", report.table.len());
    print_failures(&report.failures);

    if report.is_partial() {
        println!(
            "⚠️  Partial download written to: {} ({} of {} events missing)",
            output.display(),
            report.failures.len(),
            report.events
        );
    } else {
        println!("✅ Line items written to: {}", output.display());
    }

    Ok(())
}

/// List events that were omitted from a fetch
pub fn print_failures(failures: &[FetchFailure]) {
    if failures.is_empty() {
        return;
    }
    println!();
    println!("   ⚠️  {} event(s) could not be fetched:", failures.len());
    for failure in failures {
        let status = failure
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "      {} {} [{}] {}",
            failure.event_id, failure.event_name, status, failure.message
        );
    }
    println!();
}
