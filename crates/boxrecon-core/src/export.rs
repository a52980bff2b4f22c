//! Export of merged and reconciled tables
//!
//! Supports:
//! - Merged table CSV (manual fields plus matched API line fields)
//! - Reconciled table CSV with `consolidated_payment_type` and
//!   `consolidated_payment_status` appended
//! - JSON report of a whole reconciliation run
//!
//! Money is written as plain two-decimal numbers and the guest is re-packed
//! as "Name (email)", so the Normalizer reads an export back unchanged.

use std::io::Write;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::models::{MergedRecord, ReconciledRecord};
use crate::pipeline::ReconReport;

/// Header of the merged table export
pub const MERGED_HEADER: &[&str] = &[
    "source_row",
    "event_id",
    "location",
    "event",
    "event_date",
    "guest",
    "order_type",
    "ordered_on",
    "total",
    "menu_item",
    "quantity",
    "unit_price",
    "line_price",
    "status",
];

pub const PAYMENT_TYPE_COLUMN: &str = "consolidated_payment_type";
pub const PAYMENT_STATUS_COLUMN: &str = "consolidated_payment_status";

fn timestamp(value: Option<NaiveDateTime>) -> String {
    value
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

/// Re-pack a guest name and identifier the way the exports carry them
pub fn pack_guest(name: &str, identifier: Option<&str>) -> String {
    match identifier {
        Some(id) if name.is_empty() => format!("({})", id),
        Some(id) => format!("{} ({})", name, id),
        None => name.to_string(),
    }
}

fn merged_fields(record: &MergedRecord) -> Vec<String> {
    vec![
        record.source_row.to_string(),
        record.event_id.clone().unwrap_or_default(),
        record.location.clone(),
        record.event.clone(),
        timestamp(record.event_date),
        pack_guest(&record.guest_name, record.guest_email.as_deref()),
        record.order_type.clone(),
        timestamp(record.ordered_on),
        money(record.total),
        record.menu_item.clone().unwrap_or_default(),
        record.quantity.map(|q| q.to_string()).unwrap_or_default(),
        record.unit_price.map(money).unwrap_or_default(),
        record.line_price.map(money).unwrap_or_default(),
        record.status.clone().unwrap_or_default(),
    ]
}

/// Write the merged table as CSV
pub fn write_merged_csv<W: Write>(writer: W, records: &[MergedRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(MERGED_HEADER)?;
    for record in records {
        wtr.write_record(merged_fields(record))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the reconciled table as CSV; unclassified rows get empty labels
pub fn write_reconciled_csv<W: Write>(writer: W, records: &[ReconciledRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = MERGED_HEADER.to_vec();
    header.push(PAYMENT_TYPE_COLUMN);
    header.push(PAYMENT_STATUS_COLUMN);
    wtr.write_record(&header)?;

    for reconciled in records {
        let mut fields = merged_fields(&reconciled.record);
        fields.push(
            reconciled
                .payment_type
                .map(|p| p.label().to_string())
                .unwrap_or_default(),
        );
        fields.push(
            reconciled
                .settlement
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
        );
        wtr.write_record(fields)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Serialize a reconciliation report as pretty JSON
pub fn to_json(report: &ReconReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
