//! Normalizer: cleans one raw table per source
//!
//! Table-level passes run in a fixed order:
//! 1. Column names cleaned (trim, lower-case, whitespace → `_`)
//! 2. Merged-cell columns forward-filled
//! 3. Rows blank in every required column dropped
//! 4. Multi-valued cells exploded into one row per value
//! 5. Currency columns coerced to plain decimals (zero when unparseable)
//!
//! The typed builders in [`records`] then parse packed fields once.

pub mod fields;
pub mod records;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ColumnsConfig, NormalizeConfig, ReconConfig};
use crate::error::Result;
use crate::models::{ApiLineItem, ManualRecord, PaymentBuckets};
use crate::table::RawTable;

pub use fields::{
    clean_column_name, coerce_currency, collapse_whitespace, fold_text, parse_currency,
    parse_timestamp, round_to_minute, split_guest, GuestField, LocationPrefix,
    LocationStandardizer,
};

/// Cleaning rules for one source table (column names in cleaned form)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeRules {
    pub currency_columns: Vec<String>,
    pub forward_fill: Vec<String>,
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explode_column: Option<String>,
    pub explode_delimiter: String,
}

impl Default for NormalizeRules {
    fn default() -> Self {
        Self {
            currency_columns: Vec::new(),
            forward_fill: Vec::new(),
            required: Vec::new(),
            explode_column: None,
            explode_delimiter: "|".to_string(),
        }
    }
}

/// Counts of every local recovery the normalizer made
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub dropped_rows: usize,
    /// Extra rows created by exploding multi-valued cells
    pub exploded_rows: usize,
    pub forward_filled: usize,
    /// Currency cells replaced by zero
    pub coerced_currency: usize,
    pub coerced_quantity: usize,
    /// Guest fields without a trailing "(identifier)"
    pub unparsed_guests: usize,
    /// Non-blank timestamp cells that matched no known format
    pub unparsed_timestamps: usize,
}

impl NormalizeReport {
    pub fn has_recoveries(&self) -> bool {
        self.dropped_rows > 0
            || self.coerced_currency > 0
            || self.coerced_quantity > 0
            || self.unparsed_timestamps > 0
    }
}

/// Typed records plus the report of what was coerced to get them
#[derive(Debug, Clone)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub report: NormalizeReport,
}

/// Apply the table-level passes
pub fn normalize_table(table: &RawTable, rules: &NormalizeRules) -> (RawTable, NormalizeReport) {
    let mut report = NormalizeReport {
        rows_in: table.len(),
        ..Default::default()
    };

    let columns: Vec<String> = table.columns.iter().map(|c| clean_column_name(c)).collect();
    let mut cleaned = RawTable::new(columns, table.rows.clone());

    report.forward_filled = forward_fill(&mut cleaned, &rules.forward_fill);
    report.dropped_rows = drop_incomplete(&mut cleaned, &rules.required);
    if let Some(column) = &rules.explode_column {
        report.exploded_rows = explode(&mut cleaned, column, &rules.explode_delimiter);
    }
    report.coerced_currency = coerce_currency_columns(&mut cleaned, &rules.currency_columns);
    report.rows_out = cleaned.len();

    debug!(
        rows_in = report.rows_in,
        rows_out = report.rows_out,
        dropped = report.dropped_rows,
        exploded = report.exploded_rows,
        "Normalized table"
    );

    (cleaned, report)
}

/// Fill blank cells from the nearest non-blank cell above; returns cells filled
pub fn forward_fill(table: &mut RawTable, columns: &[String]) -> usize {
    let mut filled = 0;
    for column in columns {
        let Some(col) = table.column_index(column) else {
            continue;
        };
        let mut last: Option<String> = None;
        for row in &mut table.rows {
            if row[col].trim().is_empty() {
                if let Some(value) = &last {
                    row[col] = value.clone();
                    filled += 1;
                }
            } else {
                last = Some(row[col].clone());
            }
        }
    }
    filled
}

/// Drop rows whose required cells are all blank; returns rows dropped
///
/// Required columns absent from the header are ignored.
pub fn drop_incomplete(table: &mut RawTable, required: &[String]) -> usize {
    let indices: Vec<usize> = required
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();
    if indices.is_empty() {
        return 0;
    }

    let before = table.rows.len();
    table
        .rows
        .retain(|row| indices.iter().any(|&i| !row[i].trim().is_empty()));
    before - table.rows.len()
}

/// One row per delimited value in `column`; returns the number of rows added
///
/// Empty pieces are skipped. A cell with no non-empty piece keeps its row.
pub fn explode(table: &mut RawTable, column: &str, delimiter: &str) -> usize {
    let Some(col) = table.column_index(column) else {
        return 0;
    };
    if delimiter.is_empty() {
        return 0;
    }

    let before = table.rows.len();
    let mut rows = Vec::with_capacity(before);
    for row in table.rows.drain(..) {
        let pieces: Vec<String> = row[col]
            .split(delimiter)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if pieces.len() <= 1 {
            rows.push(row);
            continue;
        }

        for piece in pieces {
            let mut exploded = row.clone();
            exploded[col] = piece;
            rows.push(exploded);
        }
    }
    table.rows = rows;
    table.rows.len() - before
}

/// Rewrite currency cells as plain decimals; returns cells coerced to zero
pub fn coerce_currency_columns(table: &mut RawTable, columns: &[String]) -> usize {
    let mut coerced = 0;
    for column in columns {
        let Some(col) = table.column_index(column) else {
            continue;
        };
        for row in &mut table.rows {
            let (value, was_coerced) = coerce_currency(&row[col]);
            if was_coerced {
                coerced += 1;
            }
            row[col] = value.to_string();
        }
    }
    coerced
}

/// Runs the table passes and typed builders for each source
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: NormalizeConfig,
    columns: ColumnsConfig,
    locations: LocationStandardizer,
}

impl Normalizer {
    pub fn new(config: &ReconConfig) -> Self {
        Self {
            rules: config.normalize.clone(),
            columns: config.columns.clone(),
            locations: LocationStandardizer::new(&config.normalize.location_prefixes),
        }
    }

    pub fn locations(&self) -> &LocationStandardizer {
        &self.locations
    }

    /// Normalize the manually uploaded preorder/box-log report
    pub fn manual(&self, table: &RawTable) -> Result<Normalized<ManualRecord>> {
        let (cleaned, mut report) = normalize_table(table, &self.rules.manual);
        let records =
            records::manual_records(&cleaned, &self.columns.manual, &self.locations, &mut report)?;
        Ok(Normalized { records, report })
    }

    /// Normalize flattened catering API line items
    pub fn api(&self, table: &RawTable) -> Result<Normalized<ApiLineItem>> {
        let (cleaned, mut report) = normalize_table(table, &self.rules.api);
        let records =
            records::api_line_items(&cleaned, &self.columns.api, &self.locations, &mut report)?;
        Ok(Normalized { records, report })
    }

    /// Normalize the consolidated-payment bucket sheet
    pub fn payments(&self, table: &RawTable) -> Result<Normalized<PaymentBuckets>> {
        let (cleaned, mut report) = normalize_table(table, &self.rules.payments);
        let records = records::payment_buckets(
            &cleaned,
            &self.columns.payments,
            &self.locations,
            &mut report,
        )?;
        Ok(Normalized { records, report })
    }
}
