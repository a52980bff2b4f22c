//! Report command implementations

use std::path::Path;

use anyhow::{Context, Result};
use boxrecon_core::{location_leaderboard, LeaderboardEntry, Pipeline, ReconConfig};

use super::{read_table, truncate};

/// Spend per box from the manual export, lump sums counted once
pub fn leaderboard(config: &ReconConfig, manual: &Path) -> Result<Vec<LeaderboardEntry>> {
    let table = read_table(manual)?;
    let pipeline = Pipeline::new(config.clone()).context("Invalid reconcile config")?;
    let (rows, _) = pipeline
        .dedupe_manual(&table)
        .with_context(|| format!("Failed to normalize {}", manual.display()))?;
    Ok(location_leaderboard(&rows))
}

pub fn cmd_leaderboard(config: &ReconConfig, manual: &Path, limit: usize) -> Result<()> {
    let entries = leaderboard(config, manual)?;

    println!();
    println!("🏆 Box Spend Leaderboard");
    println!("   ─────────────────────────────────────────────────────────────");

    if entries.is_empty() {
        println!("   No spend found in {}.", manual.display());
        return Ok(());
    }

    let total: f64 = entries.iter().map(|e| e.total).sum();
    println!("   Total: £{:.2} across {} box(es)", total, entries.len());
    println!();
    println!(
        "   {:>3}  {:30} │ {:>12} │ {:>6} │ {:>6}",
        "#", "Location", "Spend", "Rows", "Events"
    );
    println!("   ─────────────────────────────────┼──────────────┼────────┼───────");

    for (rank, entry) in entries.iter().take(limit).enumerate() {
        println!(
            "   {:>3}  {:30} │ {:>12.2} │ {:>6} │ {:>6}",
            rank + 1,
            truncate(&entry.location, 30),
            entry.total,
            entry.rows,
            entry.events
        );
    }

    if entries.len() > limit {
        println!();
        println!("   ... and {} more (use --limit to show more)", entries.len() - limit);
    }
    println!();

    Ok(())
}
