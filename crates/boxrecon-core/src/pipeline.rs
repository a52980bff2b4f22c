//! Reconciliation pipeline
//!
//! raw tables → Normalizer (×2) → Key Mapper → Merger → Deduplicator →
//! optional Classifier. Each stage consumes its whole input before the next
//! begins, and each run works on its own copies of the tables.

use serde::Serialize;
use tracing::{info, warn};

use crate::classify::{filter_records, Classifier};
use crate::client::FetchFailure;
use crate::config::ReconConfig;
use crate::dedup::{dedupe_lump_sums, DedupStats};
use crate::error::Result;
use crate::keymap::KeyMapper;
use crate::merge::{merge, MergeStats};
use crate::models::{GroupClassification, KeyCollision, MergedRecord, ReconciledRecord};
use crate::normalize::{NormalizeReport, Normalizer};
use crate::table::RawTable;

/// Per-run filters and caller-supplied context
#[derive(Debug, Clone, Default)]
pub struct ReconOptions {
    /// Restrict classification to one event (case-insensitive)
    pub event: Option<String>,
    /// API line status to classify; falls back to `reconcile.status`.
    /// An empty string disables the status filter.
    pub status: Option<String>,
    /// Failures from fetching the API table, carried into the report
    pub fetch_failures: Vec<FetchFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizeReports {
    pub manual: NormalizeReport,
    pub api: NormalizeReport,
    pub payments: Option<NormalizeReport>,
}

/// Everything one reconciliation run produced
#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    /// All merged rows after lump-sum deduplication
    pub merged: Vec<MergedRecord>,
    /// Rows passing the status/event filters, annotated per group
    pub reconciled: Vec<ReconciledRecord>,
    /// Empty when no payment table was supplied
    pub groups: Vec<GroupClassification>,
    pub collisions: Vec<KeyCollision>,
    pub normalize: NormalizeReports,
    pub merge: MergeStats,
    pub dedup: DedupStats,
    pub fetch_failures: Vec<FetchFailure>,
}

impl ReconReport {
    pub fn classification(&self, location: &str, event: &str) -> Option<&GroupClassification> {
        self.groups
            .iter()
            .find(|g| g.location == location && g.event == event)
    }
}

#[derive(Debug, Clone)]
pub enum ReconOutcome {
    /// Nothing left to reconcile after filtering
    NoData { reason: String },
    Reconciled(Box<ReconReport>),
}

impl ReconOutcome {
    pub fn report(&self) -> Option<&ReconReport> {
        match self {
            ReconOutcome::Reconciled(report) => Some(report),
            ReconOutcome::NoData { .. } => None,
        }
    }
}

pub struct Pipeline {
    config: ReconConfig,
    normalizer: Normalizer,
    classifier: Classifier,
}

impl Pipeline {
    pub fn new(config: ReconConfig) -> Result<Self> {
        let priority = config.reconcile.priority()?;
        Ok(Self {
            normalizer: Normalizer::new(&config),
            classifier: Classifier::new(priority),
            config,
        })
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Run every stage over the three source tables
    pub fn run(
        &self,
        manual: &RawTable,
        api: &RawTable,
        payments: Option<&RawTable>,
        options: ReconOptions,
    ) -> Result<ReconOutcome> {
        let manual = self.normalizer.manual(manual)?;
        let api = self.normalizer.api(api)?;
        let payments = payments.map(|t| self.normalizer.payments(t)).transpose()?;

        let mapper = KeyMapper::build(&api.records);
        let (merged, merge_stats) = merge(&manual.records, &api.records, &mapper);
        let (merged, dedup_stats) = dedupe_lump_sums(merged);

        if merged.is_empty() {
            return Ok(ReconOutcome::NoData {
                reason: "no manual records after normalization".to_string(),
            });
        }

        let status = options
            .status
            .clone()
            .or_else(|| self.config.reconcile.status.clone());
        let selected = filter_records(&merged, status.as_deref(), options.event.as_deref());
        if selected.is_empty() {
            return Ok(ReconOutcome::NoData {
                reason: describe_filters(status.as_deref(), options.event.as_deref()),
            });
        }

        let groups = match &payments {
            Some(p) => self.classifier.classify(&selected, &p.records),
            None => Vec::new(),
        };

        let reconciled: Vec<ReconciledRecord> = selected
            .iter()
            .map(|record| {
                let payment_type = groups
                    .iter()
                    .find(|g| g.location == record.location && g.event == record.event)
                    .and_then(|g| g.payment_type);
                ReconciledRecord {
                    record: (*record).clone(),
                    payment_type,
                    settlement: payment_type.map(|p| self.config.reconcile.settlement_for(p)),
                }
            })
            .collect();

        if !options.fetch_failures.is_empty() {
            warn!(
                failures = options.fetch_failures.len(),
                "Reconciling with partial API data"
            );
        }
        info!(
            merged = merged.len(),
            reconciled = reconciled.len(),
            groups = groups.len(),
            classified = groups.iter().filter(|g| g.payment_type.is_some()).count(),
            "Reconciliation complete"
        );

        Ok(ReconOutcome::Reconciled(Box::new(ReconReport {
            merged,
            reconciled,
            groups,
            collisions: mapper.collisions().to_vec(),
            normalize: NormalizeReports {
                manual: manual.report,
                api: api.report,
                payments: payments.map(|p| p.report),
            },
            merge: merge_stats,
            dedup: dedup_stats,
            fetch_failures: options.fetch_failures,
        })))
    }

    /// Normalize and lump-sum deduplicate the manual table on its own
    ///
    /// Rows carry no API fields; used for spend reporting without an API join.
    pub fn dedupe_manual(&self, manual: &RawTable) -> Result<(Vec<MergedRecord>, NormalizeReport)> {
        let normalized = self.normalizer.manual(manual)?;
        let rows = normalized
            .records
            .iter()
            .map(|r| MergedRecord::unmatched(r, None))
            .collect();
        let (rows, _) = dedupe_lump_sums(rows);
        Ok((rows, normalized.report))
    }
}

fn describe_filters(status: Option<&str>, event: Option<&str>) -> String {
    match (status.filter(|s| !s.is_empty()), event) {
        (Some(s), Some(e)) => format!("no rows with status '{}' for event '{}'", s, e),
        (Some(s), None) => format!("no rows with status '{}'", s),
        (None, Some(e)) => format!("no rows for event '{}'", e),
        (None, None) => "no rows to reconcile".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentType, SettlementStatus};

    fn table(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn manual() -> RawTable {
        table(
            &["Location", "Event", "Event Date", "Guest", "Order Type", "Ordered On", "Total"],
            &[
                &[
                    "Exec Box 5",
                    "Arsenal v Chelsea",
                    "09/03/2024 15:00",
                    "Jo Bloggs (jo@example.com)",
                    "Preorder",
                    "01/03/2024 10:00",
                    "£120.00",
                ],
                &[
                    "",
                    "Arsenal v Chelsea",
                    "09/03/2024 15:00",
                    "Jo Bloggs (jo@example.com)",
                    "Preorder",
                    "01/03/2024 10:00",
                    "£120.00",
                ],
                &[
                    "Box 7",
                    "Arsenal v Chelsea",
                    "09/03/2024 15:00",
                    "Al Smith (al@example.com)",
                    "Preorder",
                    "02/03/2024 09:00",
                    "£45.00",
                ],
            ],
        )
    }

    fn api() -> RawTable {
        table(
            &[
                "event_id", "location", "event", "kickoff", "guest", "order_type", "menu_item",
                "quantity", "unit_price", "status",
            ],
            &[
                &[
                    "EV-1",
                    "Executive Box 5",
                    "Arsenal v Chelsea",
                    "2024-03-09T15:00:20",
                    "Jo Bloggs (jo@example.com)",
                    "preorder",
                    "Champagne",
                    "1",
                    "120.00",
                    "Completed",
                ],
                &[
                    "EV-1",
                    "Box 7",
                    "Arsenal v Chelsea",
                    "2024-03-09T15:00:00",
                    "Al Smith (al@example.com)",
                    "preorder",
                    "Beer",
                    "3",
                    "15.00",
                    "Completed",
                ],
            ],
        )
    }

    fn payments() -> RawTable {
        table(
            &["Location", "Event", "Drawdown", "Credit Card", "Purchase Orders", "EFT"],
            &[
                &["Exec Box 5", "Arsenal v Chelsea", "£120.00", "0", "0", "0"],
                &["Box 7", "Arsenal v Chelsea", "0", "£45.00", "£45.00", "0"],
            ],
        )
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(ReconConfig::default()).unwrap()
    }

    #[test]
    fn test_full_run() {
        let outcome = pipeline()
            .run(&manual(), &api(), Some(&payments()), ReconOptions::default())
            .unwrap();
        let report = outcome.report().unwrap();

        // Forward-filled duplicate joined, then its lump sum zeroed
        assert_eq!(report.merged.len(), 3);
        let box5: f64 = report
            .merged
            .iter()
            .filter(|r| r.location == "executive box 5")
            .map(|r| r.total)
            .sum();
        assert_eq!(box5, 120.0);
        assert_eq!(report.dedup.zeroed_rows, 1);

        let box5 = report
            .classification("executive box 5", "arsenal v chelsea")
            .unwrap();
        assert_eq!(box5.payment_type, Some(PaymentType::Drawdown));

        let box7 = report.classification("box 7", "arsenal v chelsea").unwrap();
        assert_eq!(box7.payment_type, Some(PaymentType::CreditCard));
        assert!(box7.is_ambiguous());

        let pending: Vec<_> = report
            .reconciled
            .iter()
            .filter(|r| r.settlement == Some(SettlementStatus::Pending))
            .collect();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|r| r.record.location == "executive box 5"));
    }

    #[test]
    fn test_without_payments_leaves_rows_unclassified() {
        let outcome = pipeline()
            .run(&manual(), &api(), None, ReconOptions::default())
            .unwrap();
        let report = outcome.report().unwrap();
        assert!(report.groups.is_empty());
        assert!(report.reconciled.iter().all(|r| r.payment_type.is_none()));
    }

    #[test]
    fn test_no_data_after_filter() {
        let options = ReconOptions {
            event: Some("Spurs v Everton".into()),
            ..Default::default()
        };
        let outcome = pipeline()
            .run(&manual(), &api(), Some(&payments()), options)
            .unwrap();
        match outcome {
            ReconOutcome::NoData { reason } => assert!(reason.contains("Spurs v Everton")),
            ReconOutcome::Reconciled(_) => panic!("expected no data"),
        }
    }

    #[test]
    fn test_empty_manual_is_no_data() {
        let empty = table(&["location", "event", "guest", "total"], &[]);
        let outcome = pipeline()
            .run(&empty, &api(), None, ReconOptions::default())
            .unwrap();
        assert!(matches!(outcome, ReconOutcome::NoData { .. }));
    }

    #[test]
    fn test_status_filter_disabled_with_empty_string() {
        let mut api = api();
        api.rows[1][9] = "Cancelled".into();

        let default = pipeline()
            .run(&manual(), &api, None, ReconOptions::default())
            .unwrap();
        assert_eq!(default.report().unwrap().reconciled.len(), 2);

        let all = pipeline()
            .run(
                &manual(),
                &api,
                None,
                ReconOptions {
                    status: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(all.report().unwrap().reconciled.len(), 3);
    }

    #[test]
    fn test_oversized_totals_coerced_not_summed() {
        let manual = table(
            &["location", "event", "guest", "total"],
            &[
                &["Box 1", "Arsenal v Chelsea", "Jo (jo@example.com)", "1e300"],
                &["Box 1", "Arsenal v Chelsea", "Al (al@example.com)", "1e300"],
            ],
        );
        let payments = table(
            &["location", "event", "drawdown", "credit_card", "purchase_orders", "eft"],
            &[&["Box 1", "Arsenal v Chelsea", "1e300", "0", "0", "0"]],
        );

        let outcome = pipeline()
            .run(
                &manual,
                &api(),
                Some(&payments),
                ReconOptions {
                    status: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        let report = outcome.report().unwrap();

        assert_eq!(report.normalize.manual.coerced_currency, 2);
        assert_eq!(report.normalize.payments.as_ref().unwrap().coerced_currency, 1);
        let group = report.classification("box 1", "arsenal v chelsea").unwrap();
        assert_eq!(group.box_total, 0.0);
        assert_eq!(group.payment_type, None);
    }

    #[test]
    fn test_deterministic() {
        let p = pipeline();
        let a = p
            .run(&manual(), &api(), Some(&payments()), ReconOptions::default())
            .unwrap();
        let b = p
            .run(&manual(), &api(), Some(&payments()), ReconOptions::default())
            .unwrap();
        let (a, b) = (a.report().unwrap(), b.report().unwrap());
        assert_eq!(a.merged, b.merged);
        assert_eq!(a.reconciled, b.reconciled);
        assert_eq!(a.groups, b.groups);
    }

    #[test]
    fn test_dedupe_manual() {
        let (rows, report) = pipeline().dedupe_manual(&manual()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(report.forward_filled, 1);
        let total: f64 = rows.iter().map(|r| r.total).sum();
        assert_eq!(total, 165.0);
    }
}
