//! Normalize command implementation

use std::path::Path;

use anyhow::{Context, Result};
use boxrecon_core::normalize::normalize_table;
use boxrecon_core::{NormalizeReport, Normalizer, RawTable, ReconConfig};

use super::{read_table, write_table};
use crate::cli::SourceKind;

/// Clean a table and parse it into typed records, returning the cleaned table
pub fn normalize_file(
    config: &ReconConfig,
    table: &RawTable,
    kind: SourceKind,
) -> Result<(RawTable, usize, NormalizeReport)> {
    let normalizer = Normalizer::new(config);
    let rules = match kind {
        SourceKind::Manual => &config.normalize.manual,
        SourceKind::Api => &config.normalize.api,
        SourceKind::Payments => &config.normalize.payments,
    };
    let (cleaned, _) = normalize_table(table, rules);

    // Typed parsing checks required columns and counts per-cell recoveries
    let (records, report) = match kind {
        SourceKind::Manual => {
            let n = normalizer.manual(table)?;
            (n.records.len(), n.report)
        }
        SourceKind::Api => {
            let n = normalizer.api(table)?;
            (n.records.len(), n.report)
        }
        SourceKind::Payments => {
            let n = normalizer.payments(table)?;
            (n.records.len(), n.report)
        }
    };

    Ok((cleaned, records, report))
}

pub fn cmd_normalize(
    config: &ReconConfig,
    file: &Path,
    kind: SourceKind,
    output: Option<&Path>,
) -> Result<()> {
    println!("🧹 Normalizing {}...", file.display());

    let table = read_table(file)?;
    let (cleaned, records, report) = normalize_file(config, &table, kind)
        .with_context(|| format!("Failed to normalize {}", file.display()))?;

    println!();
    println!("   Rows in:            {}", report.rows_in);
    println!("   Rows out:           {}", report.rows_out);
    println!("   Records:            {}", records);
    println!("   Dropped (blank):    {}", report.dropped_rows);
    println!("   Exploded:           {}", report.exploded_rows);
    println!("   Forward-filled:     {}", report.forward_filled);
    println!("   Currency coerced:   {}", report.coerced_currency);
    if report.coerced_quantity > 0 {
        println!("   Quantity coerced:   {}", report.coerced_quantity);
    }
    if report.unparsed_guests > 0 {
        println!("   ⚠️  Guests without identifier: {}", report.unparsed_guests);
    }
    if report.unparsed_timestamps > 0 {
        println!("   ⚠️  Unparsed timestamps: {}", report.unparsed_timestamps);
    }

    if let Some(output) = output {
        write_table(&cleaned, output)?;
        println!();
        println!("✅ Cleaned table written to: {}", output.display());
    }

    Ok(())
}
