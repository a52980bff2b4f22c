//! Spend leaderboard and reconciliation summary

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{to_cents, GroupClassification, MergedRecord, PaymentType};

/// Total spend for one location (box)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub location: String,
    pub total: f64,
    pub rows: usize,
    pub events: usize,
}

/// Spend per location, highest first, ties broken by location name
///
/// Run on deduplicated rows, or lump sums are counted once per exploded row.
pub fn location_leaderboard(records: &[MergedRecord]) -> Vec<LeaderboardEntry> {
    let mut by_location: BTreeMap<&str, (i64, usize, Vec<&str>)> = BTreeMap::new();
    for record in records {
        let entry = by_location
            .entry(record.location.as_str())
            .or_insert_with(|| (0, 0, Vec::new()));
        entry.0 = entry.0.saturating_add(to_cents(record.total));
        entry.1 += 1;
        if !entry.2.contains(&record.event.as_str()) {
            entry.2.push(record.event.as_str());
        }
    }

    let mut entries: Vec<(String, i64, usize, usize)> = by_location
        .into_iter()
        .map(|(location, (cents, rows, events))| {
            (location.to_string(), cents, rows, events.len())
        })
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    entries
        .into_iter()
        .map(|(location, cents, rows, events)| LeaderboardEntry {
            location,
            total: cents as f64 / 100.0,
            rows,
            events,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentTypeCount {
    pub payment_type: PaymentType,
    pub groups: usize,
    pub total: f64,
}

/// Group counts by outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconSummary {
    pub groups: usize,
    /// One entry per payment type, in `PaymentType::all` order
    pub by_type: Vec<PaymentTypeCount>,
    pub unclassified: usize,
    /// Groups whose total matched more than one bucket
    pub ambiguous: usize,
    /// Groups with no payment bucket row at all
    pub missing_buckets: usize,
}

pub fn summarize(groups: &[GroupClassification]) -> ReconSummary {
    let by_type = PaymentType::all()
        .iter()
        .map(|&payment_type| {
            let matched: Vec<&GroupClassification> = groups
                .iter()
                .filter(|g| g.payment_type == Some(payment_type))
                .collect();
            let cents = matched
                .iter()
                .fold(0i64, |acc, g| acc.saturating_add(to_cents(g.box_total)));
            PaymentTypeCount {
                payment_type,
                groups: matched.len(),
                total: cents as f64 / 100.0,
            }
        })
        .collect();

    ReconSummary {
        groups: groups.len(),
        by_type,
        unclassified: groups.iter().filter(|g| g.payment_type.is_none()).count(),
        ambiguous: groups.iter().filter(|g| g.is_ambiguous()).count(),
        missing_buckets: groups.iter().filter(|g| !g.has_buckets).count(),
    }
}
