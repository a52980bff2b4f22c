//! boxrecon CLI - Hospitality box sales reconciliation
//!
//! Usage:
//!   boxrecon normalize --file CSV --kind manual      Clean one export
//!   boxrecon fetch --from DATE --to DATE -o CSV      Download catering line items
//!   boxrecon reconcile --manual CSV --api CSV        Merge and classify payments
//!   boxrecon leaderboard --manual CSV                Rank boxes by spend

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so stdout stays parseable (`reconcile --json`)
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Normalize { file, kind, output } => {
            let config = commands::load_config(config_path)?;
            commands::cmd_normalize(&config, &file, kind, output.as_deref())
        }
        Commands::Fetch { from, to, output } => {
            let config = commands::load_config(config_path)?;
            let client = commands::catering_client(&config)?;
            let from = commands::parse_date(&from, "--from")?;
            let to = commands::parse_date(&to, "--to")?;
            commands::cmd_fetch(&config, &client, from, to, &output).await
        }
        Commands::Reconcile {
            manual,
            api,
            from,
            to,
            payments,
            event,
            status,
            output,
            json,
            watch,
        } => {
            let config = commands::load_config(config_path)?;
            let api = match (api, from, to) {
                (Some(path), _, _) => commands::ApiInput::File(path),
                (None, Some(from), Some(to)) => commands::ApiInput::Remote {
                    client: commands::catering_client(&config)?,
                    from: commands::parse_date(&from, "--from")?,
                    to: commands::parse_date(&to, "--to")?,
                },
                _ => anyhow::bail!("Pass either --api FILE or both --from and --to"),
            };
            let request = commands::ReconcileRequest {
                manual,
                api,
                payments,
                event,
                status,
                output,
                json,
            };
            match watch {
                Some(secs) => commands::cmd_reconcile_watch(&config, &request, secs).await,
                None => commands::cmd_reconcile(&config, &request).await,
            }
        }
        Commands::Leaderboard { manual, limit } => {
            let config = commands::load_config(config_path)?;
            commands::cmd_leaderboard(&config, &manual, limit)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::cmd_config_show(config_path),
            ConfigAction::Path => commands::cmd_config_path(),
        },
    }
}
