//! Lump-sum deduplicator
//!
//! An upstream one-to-many expansion copies a single charge onto every
//! expanded row. Within each group sharing a composite key and order
//! timestamp, only the first row keeps its total; the rest are zeroed.
//! Rows left identical in every column are then collapsed.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::models::{CompositeKey, MergedRecord};

/// Grouping key: composite key plus order timestamp
pub type LumpSumKey = (CompositeKey, Option<NaiveDateTime>);

pub fn lump_sum_key(record: &MergedRecord) -> LumpSumKey {
    (record.composite_key(), record.ordered_on)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub groups: usize,
    /// Groups with more than one row
    pub lump_sum_groups: usize,
    pub zeroed_rows: usize,
    pub removed_duplicates: usize,
}

/// Zero all but the first total in each group, then drop exact duplicates
///
/// Output is ordered by group key; rows within a group keep their input order.
pub fn dedupe_lump_sums(records: Vec<MergedRecord>) -> (Vec<MergedRecord>, DedupStats) {
    let mut groups: BTreeMap<LumpSumKey, Vec<MergedRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(lump_sum_key(&record)).or_default().push(record);
    }

    let mut stats = DedupStats {
        groups: groups.len(),
        ..Default::default()
    };
    let mut output = Vec::new();

    for (_, mut rows) in groups {
        if rows.len() > 1 {
            stats.lump_sum_groups += 1;
            for row in rows.iter_mut().skip(1) {
                if row.total != 0.0 {
                    stats.zeroed_rows += 1;
                }
                row.total = 0.0;
            }
        }

        let mut kept: Vec<MergedRecord> = Vec::with_capacity(rows.len());
        for row in rows {
            if kept.iter().any(|k| k.same_content(&row)) {
                stats.removed_duplicates += 1;
            } else {
                kept.push(row);
            }
        }
        output.extend(kept);
    }

    debug!(
        groups = stats.groups,
        lump_sum_groups = stats.lump_sum_groups,
        zeroed = stats.zeroed_rows,
        removed = stats.removed_duplicates,
        "Deduplicated lump sums"
    );

    (output, stats)
}
