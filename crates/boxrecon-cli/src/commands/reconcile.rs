//! Reconcile command implementations
//!
//! - `cmd_reconcile` - One run over files or a freshly fetched API table
//! - `cmd_reconcile_watch` - Poll the input files and re-run when they change

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use boxrecon_core::export::{to_json, write_reconciled_csv};
use boxrecon_core::{
    fetch_range, memo_key, summarize, CateringApi, CateringClient, CsvFileSource, DataSource,
    FetchFailure, FetchReport, MemoCache, Pipeline, RawTable, ReconConfig, ReconOptions,
    ReconOutcome, ReconReport,
};
use chrono::NaiveDate;
use tracing::{info, warn};

use super::{print_failures, read_table, truncate};

/// Where the API line items come from
pub enum ApiInput {
    /// A CSV written by `boxrecon fetch`
    File(PathBuf),
    /// Fetched from the catering API for a kickoff date range
    Remote {
        client: CateringClient,
        from: NaiveDate,
        to: NaiveDate,
    },
}

pub struct ReconcileRequest {
    pub manual: PathBuf,
    pub api: ApiInput,
    pub payments: Option<PathBuf>,
    pub event: Option<String>,
    pub status: Option<String>,
    pub output: Option<PathBuf>,
    pub json: bool,
}

impl ReconcileRequest {
    fn options(&self, fetch_failures: Vec<FetchFailure>) -> ReconOptions {
        ReconOptions {
            event: self.event.clone(),
            status: self.status.clone(),
            fetch_failures,
        }
    }
}

async fn fetch_api(
    config: &ReconConfig,
    client: &CateringClient,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<FetchReport> {
    info!(url = %client.base_url(), %from, %to, "Fetching catering line items");
    fetch_range(client, from, to, &config.columns.api)
        .await
        .context("Failed to fetch catering line items")
}

/// Load every input and run the pipeline once
pub async fn run_reconcile(config: &ReconConfig, request: &ReconcileRequest) -> Result<ReconOutcome> {
    let manual = read_table(&request.manual)?;
    let (api, failures) = match &request.api {
        ApiInput::File(path) => (read_table(path)?, Vec::new()),
        ApiInput::Remote { client, from, to } => {
            let report = fetch_api(config, client, *from, *to).await?;
            (report.table, report.failures)
        }
    };
    let payments = request.payments.as_deref().map(read_table).transpose()?;

    let pipeline = Pipeline::new(config.clone()).context("Invalid reconcile config")?;
    pipeline
        .run(&manual, &api, payments.as_ref(), request.options(failures))
        .context("Reconciliation failed")
}

pub async fn cmd_reconcile(config: &ReconConfig, request: &ReconcileRequest) -> Result<()> {
    if !request.json {
        println!("🔄 Reconciling {}...", request.manual.display());
    }
    let outcome = run_reconcile(config, request).await?;
    present(config, &outcome, request)
}

/// The `--json` document for an outcome
pub fn json_document(outcome: &ReconOutcome) -> Result<String> {
    match outcome {
        ReconOutcome::NoData { reason } => Ok(serde_json::json!({ "no_data": reason }).to_string()),
        ReconOutcome::Reconciled(report) => to_json(report).context("Failed to serialize report"),
    }
}

/// Print (or serialize) an outcome and write the reconciled CSV if asked
fn present(
    config: &ReconConfig,
    outcome: &ReconOutcome,
    request: &ReconcileRequest,
) -> Result<()> {
    if request.json {
        println!("{}", json_document(outcome)?);
    }

    let report = match outcome {
        ReconOutcome::NoData { reason } => {
            if !request.json {
                println!("📭 Nothing to reconcile: {}", reason);
            }
            return Ok(());
        }
        ReconOutcome::Reconciled(report) => report,
    };

    if !request.json {
        print_report(config, report);
    }

    if let Some(output) = &request.output {
        let file = File::create(output)
            .with_context(|| format!("Failed to create output file: {}", output.display()))?;
        write_reconciled_csv(file, &report.reconciled)
            .with_context(|| format!("Failed to write CSV: {}", output.display()))?;
        if !request.json {
            println!("✅ Reconciled table written to: {}", output.display());
        }
    }

    Ok(())
}

fn print_report(config: &ReconConfig, report: &ReconReport) {
    println!();
    println!("📊 Reconciliation");
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Merged rows:      {} ({} matched, {} unmatched)",
        report.merged.len(),
        report.merge.matched_rows,
        report.merge.unmatched_rows
    );
    println!(
        "   Lump sums:        {} group(s), {} duplicate total(s) zeroed",
        report.dedup.lump_sum_groups, report.dedup.zeroed_rows
    );
    println!("   Reconciled rows:  {}", report.reconciled.len());

    if !report.collisions.is_empty() {
        println!(
            "   ⚠️  {} key collision(s): later API events replaced earlier ones",
            report.collisions.len()
        );
    }

    if !report.groups.is_empty() {
        let summary = summarize(&report.groups);
        println!();
        println!(
            "   {:15} │ {:>6} │ {:>12} │ {:10}",
            "Payment Type", "Boxes", "Total", "Settlement"
        );
        println!("   ────────────────┼────────┼──────────────┼───────────");
        for count in summary.by_type.iter().filter(|c| c.groups > 0) {
            println!(
                "   {:15} │ {:>6} │ {:>12.2} │ {:10}",
                count.payment_type.label(),
                count.groups,
                count.total,
                config.reconcile.settlement_for(count.payment_type).as_str()
            );
        }
        println!();
        println!("   Groups:           {}", summary.groups);
        println!("   Unclassified:     {}", summary.unclassified);
        if summary.ambiguous > 0 {
            println!("   ⚠️  Ambiguous:     {}", summary.ambiguous);
        }
        if summary.missing_buckets > 0 {
            println!("   ⚠️  No bucket row: {}", summary.missing_buckets);
        }

        let unclassified: Vec<_> = report
            .groups
            .iter()
            .filter(|g| g.payment_type.is_none())
            .collect();
        if !unclassified.is_empty() {
            println!();
            println!("   Unclassified boxes:");
            for group in unclassified {
                println!(
                    "      {:25} {:30} {:>10.2}",
                    truncate(&group.location, 25),
                    truncate(&group.event, 30),
                    group.box_total
                );
            }
        }
    }

    print_failures(&report.fetch_failures);
    println!();
}

/// Re-runs reconciliation whenever an input's content changes
///
/// File inputs are polled by content hash. A remote API table is fetched
/// once per (base URL, date range) and memoized for the life of the watcher.
pub struct ReconcileWatcher<'a> {
    request: &'a ReconcileRequest,
    pipeline: Pipeline,
    manual: CsvFileSource,
    api_file: Option<CsvFileSource>,
    payments: Option<CsvFileSource>,
    fetches: MemoCache<FetchReport>,
    runs: MemoCache<ReconOutcome>,
    last_key: Option<String>,
}

impl<'a> ReconcileWatcher<'a> {
    pub fn new(config: &ReconConfig, request: &'a ReconcileRequest) -> Result<Self> {
        let api_file = match &request.api {
            ApiInput::File(path) => Some(CsvFileSource::new(path)),
            ApiInput::Remote { .. } => None,
        };
        Ok(Self {
            request,
            pipeline: Pipeline::new(config.clone()).context("Invalid reconcile config")?,
            manual: CsvFileSource::new(&request.manual),
            api_file,
            payments: request.payments.as_ref().map(CsvFileSource::new),
            fetches: MemoCache::new(),
            runs: MemoCache::new(),
            last_key: None,
        })
    }

    /// Poll the inputs; returns the new outcome if anything changed
    pub async fn tick(&mut self) -> Result<Option<&ReconOutcome>> {
        self.manual.poll()?;
        if let Some(source) = self.api_file.as_mut() {
            source.poll()?;
        }
        if let Some(source) = self.payments.as_mut() {
            source.poll()?;
        }

        let request = self.request;
        let api_key = match &request.api {
            ApiInput::File(_) => self
                .api_file
                .as_ref()
                .and_then(|s| s.digest())
                .unwrap_or_default()
                .to_string(),
            ApiInput::Remote { client, from, to } => {
                let key = memo_key([
                    client.base_url().to_string(),
                    from.to_string(),
                    to.to_string(),
                ]);
                if self.fetches.get(&key).is_none() {
                    let report = fetch_api(self.pipeline.config(), client, *from, *to).await?;
                    self.fetches.insert(&key, report);
                }
                key
            }
        };

        let run_key = memo_key([
            self.manual.digest().unwrap_or_default().to_string(),
            api_key.clone(),
            self.payments
                .as_ref()
                .and_then(|s| s.digest())
                .unwrap_or_default()
                .to_string(),
            format!("{:?}", request.event),
            format!("{:?}", request.status),
        ]);
        if self.last_key.as_deref() == Some(run_key.as_str()) {
            return Ok(None);
        }

        let empty = RawTable::default();
        let manual = self.manual.current().unwrap_or(&empty);
        let payments = self.payments.as_ref().and_then(|s| s.current());
        let (api, failures) = match &self.api_file {
            Some(source) => (source.current().unwrap_or(&empty), Vec::new()),
            None => match self.fetches.get(&api_key) {
                Some(report) => (&report.table, report.failures.clone()),
                None => (&empty, Vec::new()),
            },
        };

        let pipeline = &self.pipeline;
        let options = request.options(failures);
        let outcome = self.runs.get_or_try_insert_with(&run_key, || {
            pipeline.run(manual, api, payments, options)
        })?;
        self.last_key = Some(run_key);
        Ok(Some(outcome))
    }

    /// Number of distinct input states reconciled so far
    pub fn runs(&self) -> usize {
        self.runs.len()
    }
}

pub async fn cmd_reconcile_watch(
    config: &ReconConfig,
    request: &ReconcileRequest,
    interval_secs: u64,
) -> Result<()> {
    let interval = Duration::from_secs(interval_secs.max(1));
    let mut watcher = ReconcileWatcher::new(config, request)?;

    if !request.json {
        println!(
            "👀 Watching {} every {}s (Ctrl-C to stop)...",
            request.manual.display(),
            interval.as_secs()
        );
    }

    let mut first = true;
    loop {
        let changed = match watcher.tick().await {
            Ok(Some(outcome)) => {
                present(config, outcome, request)?;
                true
            }
            Ok(None) => false,
            // A file caught mid-write fails to parse; try again next poll
            Err(e) if !first => {
                warn!(error = %e, "Reconcile inputs unreadable, retrying");
                false
            }
            Err(e) => return Err(e),
        };
        if changed {
            info!(runs = watcher.runs(), "Reconciled changed inputs");
        }
        first = false;
        tokio::time::sleep(interval).await;
    }
}
