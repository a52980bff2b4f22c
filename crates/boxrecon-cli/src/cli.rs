//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// boxrecon - Reconcile hospitality box sales against the catering API
#[derive(Parser)]
#[command(name = "boxrecon")]
#[command(about = "Reconcile box preorder exports against catering orders and payments", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the data-dir override, then the built-in config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which source a table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Manually uploaded preorder/box-log report
    Manual,
    /// Flattened catering API line items
    Api,
    /// Consolidated-payment bucket sheet
    Payments,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clean one exported table and report what was recovered
    Normalize {
        /// CSV file to normalize
        #[arg(short, long)]
        file: PathBuf,

        /// Source the file came from
        #[arg(short, long, value_enum)]
        kind: SourceKind,

        /// Write the cleaned table here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download catering line items for a date range
    Fetch {
        /// First kickoff date (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Last kickoff date (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge manual records with API line items and classify payments
    Reconcile {
        /// Manual preorder/box-log export
        #[arg(short, long)]
        manual: PathBuf,

        /// API line items CSV (from `boxrecon fetch`)
        #[arg(long, conflicts_with_all = ["from", "to"], required_unless_present = "from")]
        api: Option<PathBuf>,

        /// Fetch API line items from this kickoff date (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Fetch API line items up to this kickoff date (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Consolidated-payment bucket sheet
        #[arg(short, long)]
        payments: Option<PathBuf>,

        /// Only reconcile this event
        #[arg(short, long)]
        event: Option<String>,

        /// API status to reconcile (default from config; "" disables the filter)
        #[arg(short, long)]
        status: Option<String>,

        /// Write the reconciled table as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Re-run whenever an input file changes, polling every SECS seconds
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },

    /// Rank boxes by total spend
    Leaderboard {
        /// Manual preorder/box-log export
        #[arg(short, long)]
        manual: PathBuf,

        /// Number of boxes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print where the override config file is read from
    Path,
}
