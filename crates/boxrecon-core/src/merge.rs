//! Merger: left join of manual records onto API line items
//!
//! Join tuple: (event id, location, event name, guest name, guest
//! identifier, order type), exact equality after normalization. Every manual
//! record appears at least once; a record matching N lines appears N times.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::keymap::KeyMapper;
use crate::models::{ApiLineItem, ManualRecord, MergedRecord};

type JoinKey<'a> = (&'a str, &'a str, &'a str, &'a str, Option<&'a str>, &'a str);

fn line_key(line: &ApiLineItem) -> JoinKey<'_> {
    (
        line.event_id.as_str(),
        line.location.as_str(),
        line.event.as_str(),
        line.guest_name.as_str(),
        line.guest_email.as_deref(),
        line.order_type.as_str(),
    )
}

/// Counts describing one merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub manual_rows: usize,
    pub matched_rows: usize,
    pub unmatched_rows: usize,
    /// Manual records with no event id from the key mapper
    pub unmapped_rows: usize,
    pub output_rows: usize,
}

/// Left-join manual records onto API line items
///
/// Output order follows the manual records; fan-out rows for one record
/// follow the API line order.
pub fn merge(
    manual: &[ManualRecord],
    lines: &[ApiLineItem],
    mapper: &KeyMapper,
) -> (Vec<MergedRecord>, MergeStats) {
    let mut index: HashMap<JoinKey<'_>, Vec<&ApiLineItem>> = HashMap::new();
    for line in lines {
        index.entry(line_key(line)).or_default().push(line);
    }

    let mut stats = MergeStats {
        manual_rows: manual.len(),
        ..Default::default()
    };
    let mut merged = Vec::with_capacity(manual.len());

    for record in manual {
        let Some(event_id) = mapper.lookup(record) else {
            stats.unmapped_rows += 1;
            stats.unmatched_rows += 1;
            merged.push(MergedRecord::unmatched(record, None));
            continue;
        };

        let key: JoinKey<'_> = (
            event_id,
            record.location.as_str(),
            record.event.as_str(),
            record.guest_name.as_str(),
            record.guest_email.as_deref(),
            record.order_type.as_str(),
        );

        match index.get(&key) {
            Some(matches) => {
                stats.matched_rows += 1;
                merged.extend(matches.iter().map(|line| MergedRecord::matched(record, line)));
            }
            None => {
                stats.unmatched_rows += 1;
                merged.push(MergedRecord::unmatched(record, Some(event_id.to_string())));
            }
        }
    }

    stats.output_rows = merged.len();
    debug!(
        manual = stats.manual_rows,
        matched = stats.matched_rows,
        unmatched = stats.unmatched_rows,
        output = stats.output_rows,
        "Merged manual records with API line items"
    );

    (merged, stats)
}
