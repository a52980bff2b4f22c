//! Typed records built from cleaned tables
//!
//! This is the ingestion boundary: packed guest fields, currency text and
//! timestamps are parsed here once, and nothing downstream re-parses them.

use crate::config::{ApiColumns, ManualColumns, PaymentColumns};
use crate::error::{Error, Result};
use crate::models::{ApiLineItem, ManualRecord, PaymentBuckets};
use crate::table::RawTable;

use super::fields::{
    coerce_currency, fold_text, parse_quantity, parse_timestamp, split_guest,
    LocationStandardizer,
};
use super::NormalizeReport;

/// Column lookup that fails with the list of missing required headers
struct Columns<'a> {
    table: &'a RawTable,
}

impl<'a> Columns<'a> {
    fn require(&self, source: &str, names: &[&str]) -> Result<()> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| !self.table.has_column(name))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Import(format!(
                "{} table is missing column(s): {}",
                source,
                missing.join(", ")
            )))
        }
    }

    fn cell(&self, row: usize, column: &str) -> &'a str {
        self.table.get(row, column).unwrap_or("")
    }
}

fn timestamp(value: &str, report: &mut NormalizeReport) -> Option<chrono::NaiveDateTime> {
    let parsed = parse_timestamp(value);
    if parsed.is_none() && !value.trim().is_empty() {
        report.unparsed_timestamps += 1;
    }
    parsed
}

fn currency(value: &str, report: &mut NormalizeReport) -> f64 {
    let (amount, coerced) = coerce_currency(value);
    if coerced {
        report.coerced_currency += 1;
    }
    amount
}

/// Build manual preorder/box-log records
///
/// `event_date`, `order_type` and `ordered_on` are optional columns.
pub fn manual_records(
    table: &RawTable,
    columns: &ManualColumns,
    locations: &LocationStandardizer,
    report: &mut NormalizeReport,
) -> Result<Vec<ManualRecord>> {
    let cols = Columns { table };
    cols.require(
        "manual",
        &[
            columns.location.as_str(),
            columns.event.as_str(),
            columns.guest.as_str(),
            columns.total.as_str(),
        ],
    )?;

    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let guest = split_guest(cols.cell(row, &columns.guest));
        if guest.identifier.is_none() {
            report.unparsed_guests += 1;
        }

        records.push(ManualRecord {
            source_row: row,
            location: locations.standardize(cols.cell(row, &columns.location)),
            event: fold_text(cols.cell(row, &columns.event)),
            event_date: timestamp(cols.cell(row, &columns.event_date), report),
            guest_name: guest.name,
            guest_email: guest.identifier,
            order_type: fold_text(cols.cell(row, &columns.order_type)),
            ordered_on: timestamp(cols.cell(row, &columns.ordered_on), report),
            total: currency(cols.cell(row, &columns.total), report),
        });
    }

    Ok(records)
}

/// Build API line items; line price is quantity × unit price
pub fn api_line_items(
    table: &RawTable,
    columns: &ApiColumns,
    locations: &LocationStandardizer,
    report: &mut NormalizeReport,
) -> Result<Vec<ApiLineItem>> {
    let cols = Columns { table };
    cols.require(
        "api",
        &[
            columns.event_id.as_str(),
            columns.location.as_str(),
            columns.event.as_str(),
            columns.guest.as_str(),
            columns.menu_item.as_str(),
            columns.quantity.as_str(),
            columns.unit_price.as_str(),
        ],
    )?;

    let mut items = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let guest = split_guest(cols.cell(row, &columns.guest));
        if guest.identifier.is_none() {
            report.unparsed_guests += 1;
        }

        let quantity = match parse_quantity(cols.cell(row, &columns.quantity)) {
            Some(q) => q,
            None => {
                report.coerced_quantity += 1;
                0.0
            }
        };
        let unit_price = currency(cols.cell(row, &columns.unit_price), report);

        items.push(ApiLineItem {
            source_row: row,
            event_id: cols.cell(row, &columns.event_id).trim().to_string(),
            location: locations.standardize(cols.cell(row, &columns.location)),
            event: fold_text(cols.cell(row, &columns.event)),
            kickoff: timestamp(cols.cell(row, &columns.kickoff), report),
            guest_name: guest.name,
            guest_email: guest.identifier,
            order_type: fold_text(cols.cell(row, &columns.order_type)),
            menu_item: cols.cell(row, &columns.menu_item).trim().to_string(),
            quantity,
            unit_price,
            line_price: quantity * unit_price,
            status: fold_text(cols.cell(row, &columns.status)),
        });
    }

    Ok(items)
}

/// Build per (location, event) payment bucket rows
///
/// Missing bucket columns read as zero.
pub fn payment_buckets(
    table: &RawTable,
    columns: &PaymentColumns,
    locations: &LocationStandardizer,
    report: &mut NormalizeReport,
) -> Result<Vec<PaymentBuckets>> {
    let cols = Columns { table };
    cols.require(
        "payments",
        &[columns.location.as_str(), columns.event.as_str()],
    )?;

    let mut buckets = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        buckets.push(PaymentBuckets {
            source_row: row,
            location: locations.standardize(cols.cell(row, &columns.location)),
            event: fold_text(cols.cell(row, &columns.event)),
            drawdown: currency(cols.cell(row, &columns.drawdown), report),
            credit_card: currency(cols.cell(row, &columns.credit_card), report),
            purchase_orders: currency(cols.cell(row, &columns.purchase_orders), report),
            eft: currency(cols.cell(row, &columns.eft), report),
        });
    }

    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::fields::LocationPrefix;

    fn table(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn standardizer() -> LocationStandardizer {
        LocationStandardizer::new(&[LocationPrefix {
            from: "exec ".into(),
            to: "executive ".into(),
        }])
    }

    #[test]
    fn test_manual_records() {
        let t = table(
            &["location", "event", "event_date", "guest", "order_type", "ordered_on", "total"],
            &[&[
                "Exec Box 5",
                " Arsenal v Chelsea ",
                "2024-03-09 15:00",
                "Jo Bloggs (JO@example.com)",
                "Preorder",
                "01/03/2024 10:15:20",
                "120",
            ]],
        );
        let mut report = NormalizeReport::default();
        let records =
            manual_records(&t, &ManualColumns::default(), &standardizer(), &mut report).unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.location, "executive box 5");
        assert_eq!(r.event, "arsenal v chelsea");
        assert_eq!(r.guest_name, "Jo Bloggs");
        assert_eq!(r.guest_email.as_deref(), Some("jo@example.com"));
        assert_eq!(r.order_type, "preorder");
        assert_eq!(r.total, 120.0);
        assert!(r.event_date.is_some());
        assert!(r.ordered_on.is_some());
        assert_eq!(report.unparsed_guests, 0);
    }

    #[test]
    fn test_manual_optional_columns_absent() {
        let t = table(
            &["location", "event", "guest", "total"],
            &[&["Box 1", "Arsenal v Chelsea", "Walk in", "TBC"]],
        );
        let mut report = NormalizeReport::default();
        let records =
            manual_records(&t, &ManualColumns::default(), &standardizer(), &mut report).unwrap();
        assert_eq!(records[0].event_date, None);
        assert_eq!(records[0].order_type, "");
        assert_eq!(records[0].total, 0.0);
        assert_eq!(report.coerced_currency, 1);
        assert_eq!(report.unparsed_guests, 1);
    }

    #[test]
    fn test_manual_missing_required_column() {
        let t = table(&["location", "event"], &[&["Box 1", "Arsenal v Chelsea"]]);
        let mut report = NormalizeReport::default();
        let err = manual_records(&t, &ManualColumns::default(), &standardizer(), &mut report)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("guest"));
        assert!(msg.contains("total"));
    }

    #[test]
    fn test_api_line_price() {
        let t = table(
            &[
                "event_id", "location", "event", "kickoff", "guest", "order_type", "menu_item",
                "quantity", "unit_price", "status",
            ],
            &[&[
                "EV-1",
                "executive box 5",
                "Arsenal v Chelsea",
                "2024-03-09T14:59:50",
                "Jo Bloggs (jo@example.com)",
                "preorder",
                "Champagne",
                "3",
                "45.50",
                "Completed",
            ]],
        );
        let mut report = NormalizeReport::default();
        let items =
            api_line_items(&t, &ApiColumns::default(), &standardizer(), &mut report).unwrap();
        assert_eq!(items[0].line_price, 136.5);
        assert_eq!(items[0].status, "completed");
        assert_eq!(
            items[0].kickoff.map(|k| k.format("%H:%M:%S").to_string()),
            Some("15:00:00".to_string())
        );
    }

    #[test]
    fn test_payment_buckets_missing_columns_are_zero() {
        let t = table(
            &["location", "event", "credit_card"],
            &[&["Box 1", "Arsenal v Chelsea", "£450.00"]],
        );
        let mut report = NormalizeReport::default();
        let buckets =
            payment_buckets(&t, &PaymentColumns::default(), &standardizer(), &mut report)
                .unwrap();
        assert_eq!(buckets[0].credit_card, 450.0);
        assert_eq!(buckets[0].drawdown, 0.0);
        assert_eq!(report.coerced_currency, 0);
    }
}
