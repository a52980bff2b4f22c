//! Reconciliation classifier
//!
//! Sums the monetary total of each (location, event) group and compares it,
//! in whole pence, against the payment buckets reported for that group.
//! Buckets are tested in priority order; the first non-zero exact match is
//! the group's payment type. There is no tolerance beyond penny rounding.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::models::{to_cents, GroupClassification, MergedRecord, PaymentBuckets, PaymentType};
use crate::normalize::fold_text;

type GroupKey = (String, String);

/// Per-bucket totals in pence for one (location, event)
#[derive(Debug, Clone, Copy, Default)]
struct BucketCents {
    drawdown: i64,
    credit_card: i64,
    purchase_orders: i64,
    eft: i64,
}

impl BucketCents {
    fn add(&mut self, buckets: &PaymentBuckets) {
        self.drawdown = self.drawdown.saturating_add(to_cents(buckets.drawdown));
        self.credit_card = self.credit_card.saturating_add(to_cents(buckets.credit_card));
        self.purchase_orders = self
            .purchase_orders
            .saturating_add(to_cents(buckets.purchase_orders));
        self.eft = self.eft.saturating_add(to_cents(buckets.eft));
    }

    fn get(&self, payment_type: PaymentType) -> i64 {
        match payment_type {
            PaymentType::Drawdown => self.drawdown,
            PaymentType::CreditCard => self.credit_card,
            PaymentType::PurchaseOrder => self.purchase_orders,
            PaymentType::Eft => self.eft,
        }
    }
}

/// Keep rows whose API status and event name match the given filters
///
/// Filters compare case-folded text; `None` disables a filter. Rows without
/// an API match carry no status and never pass a status filter.
pub fn filter_records<'a>(
    records: &'a [MergedRecord],
    status: Option<&str>,
    event: Option<&str>,
) -> Vec<&'a MergedRecord> {
    let status = status.map(fold_text).filter(|s| !s.is_empty());
    let event = event.map(fold_text).filter(|e| !e.is_empty());

    records
        .iter()
        .filter(|r| match &status {
            Some(s) => r.status.as_deref() == Some(s.as_str()),
            None => true,
        })
        .filter(|r| match &event {
            Some(e) => &r.event == e,
            None => true,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Classifier {
    priority: Vec<PaymentType>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(PaymentType::all().to_vec())
    }
}

impl Classifier {
    pub fn new(priority: Vec<PaymentType>) -> Self {
        Self { priority }
    }

    pub fn priority(&self) -> &[PaymentType] {
        &self.priority
    }

    /// Every non-zero bucket equal to `total_cents`, in priority order
    fn matching(&self, total_cents: i64, buckets: &BucketCents) -> Vec<PaymentType> {
        self.priority
            .iter()
            .copied()
            .filter(|p| {
                let amount = buckets.get(*p);
                amount != 0 && amount == total_cents
            })
            .collect()
    }

    /// Match a single total against a single bucket row
    pub fn match_buckets(&self, total: f64, buckets: &PaymentBuckets) -> Vec<PaymentType> {
        let mut cents = BucketCents::default();
        cents.add(buckets);
        self.matching(to_cents(total), &cents)
    }

    /// Classify every (location, event) group present in `records`
    ///
    /// Output is sorted by location then event. Bucket rows sharing a
    /// (location, event) are summed; bucket rows with no records are ignored.
    pub fn classify(
        &self,
        records: &[&MergedRecord],
        buckets: &[PaymentBuckets],
    ) -> Vec<GroupClassification> {
        let mut totals: BTreeMap<GroupKey, i64> = BTreeMap::new();
        for record in records {
            let total = totals
                .entry((record.location.clone(), record.event.clone()))
                .or_insert(0);
            *total = total.saturating_add(to_cents(record.total));
        }

        let mut bucket_map: BTreeMap<GroupKey, BucketCents> = BTreeMap::new();
        for row in buckets {
            bucket_map
                .entry((row.location.clone(), row.event.clone()))
                .or_default()
                .add(row);
        }

        let mut groups = Vec::with_capacity(totals.len());
        for ((location, event), total_cents) in totals {
            let found = bucket_map.get(&(location.clone(), event.clone()));
            let matching = match found {
                Some(b) => self.matching(total_cents, b),
                None => Vec::new(),
            };

            if matching.len() > 1 {
                warn!(
                    location = %location,
                    event = %event,
                    total_cents,
                    matches = ?matching,
                    "Box total matches more than one payment bucket"
                );
            }

            groups.push(GroupClassification {
                payment_type: matching.first().copied(),
                box_total: total_cents as f64 / 100.0,
                has_buckets: found.is_some(),
                matching,
                location,
                event,
            });
        }

        debug!(
            groups = groups.len(),
            classified = groups.iter().filter(|g| g.payment_type.is_some()).count(),
            "Classified box totals"
        );

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ManualRecord;

    fn record(location: &str, total: f64, status: Option<&str>) -> MergedRecord {
        let manual = ManualRecord {
            source_row: 0,
            location: location.into(),
            event: "arsenal v chelsea".into(),
            event_date: None,
            guest_name: "Jo".into(),
            guest_email: None,
            order_type: "preorder".into(),
            ordered_on: None,
            total,
        };
        let mut merged = MergedRecord::unmatched(&manual, Some("EV-1".into()));
        merged.status = status.map(String::from);
        merged
    }

    fn buckets(location: &str, d: f64, cc: f64, po: f64, eft: f64) -> PaymentBuckets {
        PaymentBuckets {
            source_row: 0,
            location: location.into(),
            event: "arsenal v chelsea".into(),
            drawdown: d,
            credit_card: cc,
            purchase_orders: po,
            eft,
        }
    }

    #[test]
    fn test_priority_picks_credit_card_over_purchase_order() {
        let rows = [record("box 1", 300.0, None), record("box 1", 150.0, None)];
        let refs: Vec<&MergedRecord> = rows.iter().collect();
        let groups =
            Classifier::default().classify(&refs, &[buckets("box 1", 0.0, 450.0, 450.0, 0.0)]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].box_total, 450.0);
        assert_eq!(groups[0].payment_type, Some(PaymentType::CreditCard));
        assert_eq!(
            groups[0].matching,
            vec![PaymentType::CreditCard, PaymentType::PurchaseOrder]
        );
        assert!(groups[0].is_ambiguous());
    }

    #[test]
    fn test_huge_totals_saturate() {
        let rows = [record("box 1", f64::MAX, None), record("box 1", f64::MAX, None)];
        let refs: Vec<&MergedRecord> = rows.iter().collect();
        let groups = Classifier::default().classify(
            &refs,
            &[
                buckets("box 1", f64::MAX, 0.0, 0.0, 0.0),
                buckets("box 1", f64::MAX, 0.0, 0.0, 0.0),
            ],
        );

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].box_total, i64::MAX as f64 / 100.0);
    }

    #[test]
    fn test_no_near_miss_match() {
        let classifier = Classifier::default();
        assert!(classifier
            .match_buckets(99.99, &buckets("box 1", 100.0, 0.0, 0.0, 0.0))
            .is_empty());
        // One penny either way stays unclassified
        assert!(classifier
            .match_buckets(100.01, &buckets("box 1", 100.0, 0.0, 0.0, 0.0))
            .is_empty());
        assert_eq!(
            classifier.match_buckets(100.0, &buckets("box 1", 100.0, 0.0, 0.0, 0.0)),
            vec![PaymentType::Drawdown]
        );
    }

    #[test]
    fn test_zero_total_never_matches_zero_bucket() {
        let rows = [record("box 1", 0.0, None)];
        let refs: Vec<&MergedRecord> = rows.iter().collect();
        let groups =
            Classifier::default().classify(&refs, &[buckets("box 1", 0.0, 0.0, 0.0, 0.0)]);
        assert_eq!(groups[0].payment_type, None);
        assert!(groups[0].has_buckets);
    }

    #[test]
    fn test_missing_buckets_unclassified() {
        let rows = [record("box 2", 80.0, None)];
        let refs: Vec<&MergedRecord> = rows.iter().collect();
        let groups =
            Classifier::default().classify(&refs, &[buckets("box 1", 80.0, 0.0, 0.0, 0.0)]);
        assert_eq!(groups[0].payment_type, None);
        assert!(!groups[0].has_buckets);
    }

    #[test]
    fn test_custom_priority() {
        let classifier = Classifier::new(vec![PaymentType::Eft, PaymentType::CreditCard]);
        let matches = classifier.match_buckets(50.0, &buckets("box 1", 50.0, 50.0, 0.0, 50.0));
        assert_eq!(matches, vec![PaymentType::Eft, PaymentType::CreditCard]);
    }

    #[test]
    fn test_float_sum_compared_in_pence() {
        let rows = [record("box 1", 0.1, None), record("box 1", 0.2, None)];
        let refs: Vec<&MergedRecord> = rows.iter().collect();
        let groups =
            Classifier::default().classify(&refs, &[buckets("box 1", 0.0, 0.0, 0.0, 0.3)]);
        assert_eq!(groups[0].payment_type, Some(PaymentType::Eft));
    }

    #[test]
    fn test_filter_records() {
        let mut other_event = record("box 1", 10.0, Some("completed"));
        other_event.event = "spurs v everton".into();
        let rows = vec![
            record("box 1", 10.0, Some("completed")),
            record("box 1", 10.0, Some("cancelled")),
            record("box 1", 10.0, None),
            other_event,
        ];

        assert_eq!(filter_records(&rows, Some("Completed"), None).len(), 2);
        assert_eq!(
            filter_records(&rows, Some("completed"), Some("Arsenal v Chelsea")).len(),
            1
        );
        assert_eq!(filter_records(&rows, None, None).len(), 4);
    }
}
