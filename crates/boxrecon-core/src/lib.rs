//! Boxrecon Core Library
//!
//! Reconciliation engine for hospitality box sales:
//! - Normalizer for spreadsheet exports (currency, merged cells, packed guests)
//! - Key mapper and merger joining manual reports to catering API line items
//! - Lump-sum deduplication so exploded charges are counted once
//! - Payment bucket classification with a caller-owned settlement policy
//! - Catering API client with owned token refresh and explicit fetch failures
//! - CSV/JSON export, spend leaderboard, memoization and polled data sources

pub mod cache;
pub mod classify;
pub mod client;
pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod keymap;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod table;

/// Test utilities including mock catering API server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::{memo_key, MemoCache};
pub use classify::{filter_records, Classifier};
pub use client::{
    fetch_line_items, fetch_range, ApiCredentials, CateringApi, CateringClient, FetchFailure,
    FetchReport, HttpCateringClient, MockCateringClient,
};
pub use config::ReconConfig;
pub use dedup::{dedupe_lump_sums, DedupStats};
pub use error::{Error, Result};
pub use keymap::KeyMapper;
pub use merge::{merge, MergeStats};
pub use models::{
    ApiLineItem, CompositeKey, GroupClassification, KeyCollision, ManualRecord, MergedRecord,
    PaymentBuckets, PaymentType, ReconciledRecord, SettlementStatus,
};
pub use normalize::{NormalizeReport, Normalized, Normalizer};
pub use pipeline::{Pipeline, ReconOptions, ReconOutcome, ReconReport};
pub use report::{location_leaderboard, summarize, LeaderboardEntry, ReconSummary};
pub use source::{CsvFileSource, DataSource};
pub use table::RawTable;
