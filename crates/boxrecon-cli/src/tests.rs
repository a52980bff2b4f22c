//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use boxrecon_core::export::{PAYMENT_STATUS_COLUMN, PAYMENT_TYPE_COLUMN};
use boxrecon_core::test_utils::{MockCateringServer, MOCK_CLIENT_ID, MOCK_CLIENT_SECRET};
use boxrecon_core::{
    ApiCredentials, CateringClient, MockCateringClient, RawTable, ReconConfig, ReconOutcome,
};
use chrono::NaiveDate;
use tempfile::TempDir;

use crate::cli::SourceKind;
use crate::commands::{self, truncate, ApiInput, ReconcileRequest, ReconcileWatcher};

const MANUAL_CSV: &str = "Location,Event,Event Date,Guest,Order Type,Ordered On,Total
Exec Box 5,Arsenal v Chelsea,09/03/2024 15:00,Jo Bloggs (jo@example.com),Preorder,01/03/2024 10:00,\"£1,200.00\"
,Arsenal v Chelsea,09/03/2024 15:00,Jo Bloggs (jo@example.com),Preorder,01/03/2024 10:00,\"£1,200.00\"
Box 7,Arsenal v Chelsea,09/03/2024 15:00,Al Smith (al@example.com),Preorder,02/03/2024 09:00,£45.00
";

const API_CSV: &str = "event_id,location,event,kickoff,guest,order_type,menu_item,quantity,unit_price,status
EV-1001,Executive Box 5,Arsenal v Chelsea,2024-03-09T15:00:20,Jo Bloggs (jo@example.com),Preorder,Champagne Package,1,1200.00,Completed
EV-1001,Box 7,Arsenal v Chelsea,2024-03-09T14:59:40,Al Smith (al@example.com),Preorder,Beer Bucket,1,45.00,Completed
";

const PAYMENTS_CSV: &str = "Location,Event,Drawdown,Credit Card,Purchase Orders,EFT
Exec Box 5,Arsenal v Chelsea,\"£1,200.00\",0,0,0
Box 7,Arsenal v Chelsea,0,£45.00,0,0
";

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn read(path: &Path) -> RawTable {
    RawTable::from_csv(fs::File::open(path).unwrap()).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn file_request(dir: &TempDir) -> ReconcileRequest {
    ReconcileRequest {
        manual: write(dir, "manual.csv", MANUAL_CSV),
        api: ApiInput::File(write(dir, "api.csv", API_CSV)),
        payments: Some(write(dir, "payments.csv", PAYMENTS_CSV)),
        event: None,
        status: None,
        output: Some(dir.path().join("reconciled.csv")),
        json: false,
    }
}

/// Find the first row whose `column` equals `value`
fn row_where(table: &RawTable, column: &str, value: &str) -> Option<usize> {
    (0..table.len()).find(|&i| table.get(i, column) == Some(value))
}

// ========== Shared Utility Tests ==========

#[test]
fn test_parse_date() {
    assert_eq!(
        commands::parse_date("2024-03-09", "--from").unwrap(),
        date("2024-03-09")
    );

    let err = commands::parse_date("09/03/2024", "--from").unwrap_err();
    assert!(err.to_string().contains("--from"));
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("Box 7", 10), "Box 7");
    assert_eq!(truncate("Executive Box 5", 10), "Executi...");
    assert_eq!(truncate("£££££", 4), "£...");
}

#[test]
fn test_load_config_explicit_path() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "boxrecon.toml", "[reconcile]\npending = []\n");

    let config = commands::load_config(Some(&path)).unwrap();
    assert!(config.reconcile.pending.is_empty());
    assert_eq!(config.api.timeout_secs, 30);

    let bad = write(&dir, "bad.toml", "[reconcile]\npriority = [\"cheque\"]\n");
    assert!(commands::load_config(Some(&bad)).is_err());
    assert!(commands::load_config(Some(&dir.path().join("missing.toml"))).is_err());
}

#[test]
fn test_read_table_missing_file() {
    let err = commands::read_table(Path::new("/nonexistent/manual.csv")).unwrap_err();
    assert!(err.to_string().contains("manual.csv"));
}

#[test]
fn test_cmd_config_show() {
    assert!(commands::cmd_config_show(None).is_ok());
}

// ========== Normalize Command Tests ==========

#[test]
fn test_cmd_normalize_writes_cleaned_table() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "manual.csv", MANUAL_CSV);
    let output = dir.path().join("clean.csv");

    commands::cmd_normalize(&ReconConfig::default(), &input, SourceKind::Manual, Some(&output))
        .unwrap();

    let cleaned = read(&output);
    assert!(cleaned.has_column("event_date"));
    assert_eq!(cleaned.len(), 3);
    // Merged location cell filled down, currency symbol and separators gone
    assert_eq!(cleaned.get(1, "location"), Some("Exec Box 5"));
    assert_eq!(cleaned.get(0, "total"), Some("1200"));
}

#[test]
fn test_normalize_file_reports_recoveries() {
    let table = RawTable::from_csv(MANUAL_CSV.as_bytes()).unwrap();
    let (_, records, report) =
        commands::normalize_file(&ReconConfig::default(), &table, SourceKind::Manual).unwrap();

    assert_eq!(records, 3);
    assert_eq!(report.forward_filled, 1);
    assert_eq!(report.coerced_currency, 0);
}

#[test]
fn test_cmd_normalize_missing_required_column() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "payments.csv", "Box,Drawdown\nBox 7,45\n");

    let result =
        commands::cmd_normalize(&ReconConfig::default(), &input, SourceKind::Payments, None);
    assert!(result.is_err());
}

// ========== Fetch Command Tests ==========

#[tokio::test]
async fn test_cmd_fetch_mock_backend() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("api.csv");
    let client = CateringClient::mock(MockCateringClient::seeded());

    commands::cmd_fetch(
        &ReconConfig::default(),
        &client,
        date("2024-03-01"),
        date("2024-03-31"),
        &output,
    )
    .await
    .unwrap();

    let table = read(&output);
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(0, "event_id"), Some("EV-1001"));
    assert_eq!(table.get(2, "menu_item"), Some("Beer Bucket"));
}

#[tokio::test]
async fn test_cmd_fetch_http_partial_failure() {
    let server = MockCateringServer::start().await;
    let config = ReconConfig::default();
    let credentials = ApiCredentials::new(&server.url(), MOCK_CLIENT_ID, MOCK_CLIENT_SECRET);
    let client = CateringClient::http(credentials, &config.api).unwrap();

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("api.csv");
    commands::cmd_fetch(&config, &client, date("2024-03-01"), date("2024-03-31"), &output)
        .await
        .unwrap();

    // EV-1001 (3 lines) and the flaky event after one retry; EV-FAIL omitted
    let table = read(&output);
    assert_eq!(table.len(), 4);
    assert!(row_where(&table, "event_id", "EV-FAIL").is_none());
    assert!(row_where(&table, "event_id", "EV-FLAKY").is_some());
}

#[tokio::test]
async fn test_cmd_fetch_reversed_range() {
    let dir = TempDir::new().unwrap();
    let client = CateringClient::mock(MockCateringClient::seeded());

    let result = commands::cmd_fetch(
        &ReconConfig::default(),
        &client,
        date("2024-03-31"),
        date("2024-03-01"),
        &dir.path().join("api.csv"),
    )
    .await;
    assert!(result.is_err());
}

// ========== Reconcile Command Tests ==========

#[tokio::test]
async fn test_cmd_reconcile_writes_payment_columns() {
    let dir = TempDir::new().unwrap();
    let request = file_request(&dir);
    let config = ReconConfig::default();

    commands::cmd_reconcile(&config, &request).await.unwrap();

    let table = read(request.output.as_ref().unwrap());
    let box5 = row_where(&table, "location", "executive box 5").expect("box 5 row");
    assert_eq!(table.get(box5, PAYMENT_TYPE_COLUMN), Some("Drawdown"));
    assert_eq!(table.get(box5, PAYMENT_STATUS_COLUMN), Some("Pending"));

    let box7 = row_where(&table, "location", "box 7").expect("box 7 row");
    assert_eq!(table.get(box7, PAYMENT_TYPE_COLUMN), Some("CreditCard"));
    assert_eq!(table.get(box7, PAYMENT_STATUS_COLUMN), Some("Completed"));
}

#[tokio::test]
async fn test_run_reconcile_lump_sum_counted_once() {
    let dir = TempDir::new().unwrap();
    let request = file_request(&dir);

    let outcome = commands::run_reconcile(&ReconConfig::default(), &request)
        .await
        .unwrap();
    let report = outcome.report().expect("reconciled");

    let box5: f64 = report
        .merged
        .iter()
        .filter(|r| r.location == "executive box 5")
        .map(|r| r.total)
        .sum();
    assert_eq!(box5, 1200.0);
    assert!(report.fetch_failures.is_empty());
}

#[tokio::test]
async fn test_run_reconcile_no_data_for_unknown_event() {
    let dir = TempDir::new().unwrap();
    let mut request = file_request(&dir);
    request.event = Some("Arsenal v Wolves".into());

    let outcome = commands::run_reconcile(&ReconConfig::default(), &request)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconOutcome::NoData { .. }));

    // NoData writes nothing
    commands::cmd_reconcile(&ReconConfig::default(), &request)
        .await
        .unwrap();
    assert!(!request.output.as_ref().unwrap().exists());
}

#[tokio::test]
async fn test_run_reconcile_remote_carries_failures() {
    let dir = TempDir::new().unwrap();
    let client = CateringClient::mock(MockCateringClient::seeded().with_failure("EV-1001", 503));
    let request = ReconcileRequest {
        manual: write(&dir, "manual.csv", MANUAL_CSV),
        api: ApiInput::Remote {
            client,
            from: date("2024-03-01"),
            to: date("2024-03-31"),
        },
        payments: None,
        event: None,
        // Nothing fetched, so keep unmatched rows in play
        status: Some(String::new()),
        output: None,
        json: true,
    };

    let outcome = commands::run_reconcile(&ReconConfig::default(), &request)
        .await
        .unwrap();
    let report = outcome.report().expect("reconciled");

    assert_eq!(report.fetch_failures.len(), 1);
    assert_eq!(report.fetch_failures[0].event_id, "EV-1001");
    assert_eq!(report.fetch_failures[0].status, Some(503));
    assert!(report.merged.iter().all(|r| !r.is_matched()));
}

#[tokio::test]
async fn test_json_document_parses() {
    let dir = TempDir::new().unwrap();
    let request = file_request(&dir);
    let outcome = commands::run_reconcile(&ReconConfig::default(), &request)
        .await
        .unwrap();

    let doc = commands::json_document(&outcome).unwrap();
    let value: serde_json::Value = serde_json::from_str(&doc).unwrap();
    assert!(value["merged"].as_array().is_some_and(|rows| !rows.is_empty()));
}

#[tokio::test]
async fn test_json_document_no_data() {
    let dir = TempDir::new().unwrap();
    let mut request = file_request(&dir);
    request.event = Some("Arsenal v Wolves".into());
    let outcome = commands::run_reconcile(&ReconConfig::default(), &request)
        .await
        .unwrap();

    let doc = commands::json_document(&outcome).unwrap();
    let value: serde_json::Value = serde_json::from_str(&doc).unwrap();
    assert!(value["no_data"].is_string());
}

#[tokio::test]
async fn test_reconcile_watcher_reruns_on_change() {
    let dir = TempDir::new().unwrap();
    let request = file_request(&dir);
    let config = ReconConfig::default();
    let mut watcher = ReconcileWatcher::new(&config, &request).unwrap();

    assert!(watcher.tick().await.unwrap().is_some());
    assert!(watcher.tick().await.unwrap().is_none());

    let extra = "Box 9,Arsenal v Chelsea,09/03/2024 15:00,Sam Lee (sam@example.com),Preorder,03/03/2024 12:00,£99.99\n";
    fs::write(&request.manual, format!("{}{}", MANUAL_CSV, extra)).unwrap();

    let outcome = watcher.tick().await.unwrap().expect("changed input re-runs");
    let report = outcome.report().unwrap();
    assert!(report.merged.iter().any(|r| r.location == "box 9"));
    assert_eq!(watcher.runs(), 2);
}

#[tokio::test]
async fn test_reconcile_watcher_reverted_input_reuses_run() {
    let dir = TempDir::new().unwrap();
    let request = file_request(&dir);
    let config = ReconConfig::default();
    let mut watcher = ReconcileWatcher::new(&config, &request).unwrap();

    watcher.tick().await.unwrap();
    assert_eq!(watcher.runs(), 1);

    let extra = "Box 9,Arsenal v Chelsea,09/03/2024 15:00,Sam Lee (sam@example.com),Preorder,03/03/2024 12:00,£99.99\n";
    fs::write(&request.manual, format!("{}{}", MANUAL_CSV, extra)).unwrap();
    watcher.tick().await.unwrap();
    assert_eq!(watcher.runs(), 2);

    // Back to the first state: presented again, but not recomputed
    fs::write(&request.manual, MANUAL_CSV).unwrap();
    let outcome = watcher.tick().await.unwrap().expect("changed input presents");
    assert!(outcome.report().unwrap().merged.iter().all(|r| r.location != "box 9"));
    assert_eq!(watcher.runs(), 2);
}

#[tokio::test]
async fn test_reconcile_watcher_missing_manual() {
    let dir = TempDir::new().unwrap();
    let mut request = file_request(&dir);
    request.manual = dir.path().join("missing.csv");
    let config = ReconConfig::default();
    let mut watcher = ReconcileWatcher::new(&config, &request).unwrap();

    assert!(watcher.tick().await.is_err());
}

// ========== Report Command Tests ==========

#[test]
fn test_leaderboard_counts_lump_sum_once() {
    let dir = TempDir::new().unwrap();
    let manual = write(&dir, "manual.csv", MANUAL_CSV);

    let entries = commands::leaderboard(&ReconConfig::default(), &manual).unwrap();
    let order: Vec<&str> = entries.iter().map(|e| e.location.as_str()).collect();
    assert_eq!(order, vec!["executive box 5", "box 7"]);
    assert_eq!(entries[0].total, 1200.0);
    assert_eq!(entries[1].total, 45.0);

    assert!(commands::cmd_leaderboard(&ReconConfig::default(), &manual, 1).is_ok());
}
