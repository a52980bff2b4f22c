//! Domain models for boxrecon

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Convert a currency amount to whole pence, rounding half away from zero
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// One preorder/box-log line from the manually uploaded report, after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualRecord {
    /// Index of the row in the normalized table
    pub source_row: usize,
    /// Standardized location (case-folded, prefix-expanded)
    pub location: String,
    /// Case-folded event name
    pub event: String,
    /// Event date, rounded to the minute
    pub event_date: Option<NaiveDateTime>,
    pub guest_name: String,
    /// Lower-cased identifier taken from the packed "Name (email)" field
    pub guest_email: Option<String>,
    pub order_type: String,
    pub ordered_on: Option<NaiveDateTime>,
    /// Monetary total, never negative
    pub total: f64,
}

impl ManualRecord {
    pub fn composite_key(&self) -> CompositeKey {
        CompositeKey::new(&self.location, &self.event, self.event_date)
    }
}

/// One menu/enhancement line attached to a guest order in the catering API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiLineItem {
    pub source_row: usize,
    /// Opaque event identifier from the remote system
    pub event_id: String,
    pub location: String,
    pub event: String,
    /// Kickoff timestamp, rounded to the minute
    pub kickoff: Option<NaiveDateTime>,
    pub guest_name: String,
    pub guest_email: Option<String>,
    pub order_type: String,
    pub menu_item: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// quantity × unit_price
    pub line_price: f64,
    pub status: String,
}

impl ApiLineItem {
    pub fn composite_key(&self) -> CompositeKey {
        CompositeKey::new(&self.location, &self.event, self.kickoff)
    }
}

/// (location, event name, event date rounded to the minute)
///
/// The only join predicate shared by the manual and API sources before an
/// event id has been mapped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CompositeKey {
    pub location: String,
    pub event: String,
    pub when: Option<NaiveDateTime>,
}

impl CompositeKey {
    pub fn new(location: &str, event: &str, when: Option<NaiveDateTime>) -> Self {
        Self {
            location: location.to_string(),
            event: event.to_string(),
            when,
        }
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.when {
            Some(when) => write!(
                f,
                "{} / {} / {}",
                self.location,
                self.event,
                when.format("%Y-%m-%d %H:%M")
            ),
            None => write!(f, "{} / {} / -", self.location, self.event),
        }
    }
}

/// A manual record with the API line item it joined to (if any)
///
/// Created by the merger, with `total` possibly zeroed by the lump-sum
/// deduplicator afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub source_row: usize,
    pub event_id: Option<String>,
    pub location: String,
    pub event: String,
    pub event_date: Option<NaiveDateTime>,
    pub guest_name: String,
    pub guest_email: Option<String>,
    pub order_type: String,
    pub ordered_on: Option<NaiveDateTime>,
    pub total: f64,
    pub menu_item: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub line_price: Option<f64>,
    pub status: Option<String>,
}

impl MergedRecord {
    /// A merged row with no API line attached
    pub fn unmatched(manual: &ManualRecord, event_id: Option<String>) -> Self {
        Self {
            source_row: manual.source_row,
            event_id,
            location: manual.location.clone(),
            event: manual.event.clone(),
            event_date: manual.event_date,
            guest_name: manual.guest_name.clone(),
            guest_email: manual.guest_email.clone(),
            order_type: manual.order_type.clone(),
            ordered_on: manual.ordered_on,
            total: manual.total,
            menu_item: None,
            quantity: None,
            unit_price: None,
            line_price: None,
            status: None,
        }
    }

    /// A merged row carrying the fields of a matched API line
    pub fn matched(manual: &ManualRecord, line: &ApiLineItem) -> Self {
        Self {
            menu_item: Some(line.menu_item.clone()),
            quantity: Some(line.quantity),
            unit_price: Some(line.unit_price),
            line_price: Some(line.line_price),
            status: Some(line.status.clone()),
            ..Self::unmatched(manual, Some(line.event_id.clone()))
        }
    }

    pub fn composite_key(&self) -> CompositeKey {
        CompositeKey::new(&self.location, &self.event, self.event_date)
    }

    pub fn is_matched(&self) -> bool {
        self.menu_item.is_some()
    }

    /// Column-wise equality ignoring `source_row`
    pub fn same_content(&self, other: &Self) -> bool {
        self.event_id == other.event_id
            && self.location == other.location
            && self.event == other.event
            && self.event_date == other.event_date
            && self.guest_name == other.guest_name
            && self.guest_email == other.guest_email
            && self.order_type == other.order_type
            && self.ordered_on == other.ordered_on
            && to_cents(self.total) == to_cents(other.total)
            && self.menu_item == other.menu_item
            && self.quantity == other.quantity
            && self.unit_price.map(to_cents) == other.unit_price.map(to_cents)
            && self.line_price.map(to_cents) == other.line_price.map(to_cents)
            && self.status == other.status
    }
}

/// Payment-method buckets reported by the consolidated-payment source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentType {
    Drawdown,
    CreditCard,
    PurchaseOrder,
    #[serde(rename = "EFT")]
    Eft,
}

impl PaymentType {
    /// Config/column key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drawdown => "drawdown",
            Self::CreditCard => "credit_card",
            Self::PurchaseOrder => "purchase_orders",
            Self::Eft => "eft",
        }
    }

    /// Label written to the `consolidated_payment_type` column
    pub fn label(&self) -> &'static str {
        match self {
            Self::Drawdown => "Drawdown",
            Self::CreditCard => "CreditCard",
            Self::PurchaseOrder => "PurchaseOrder",
            Self::Eft => "EFT",
        }
    }

    /// Default bucket priority order
    pub fn all() -> &'static [PaymentType] {
        &[
            Self::Drawdown,
            Self::CreditCard,
            Self::PurchaseOrder,
            Self::Eft,
        ]
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "drawdown" => Ok(Self::Drawdown),
            "credit_card" | "creditcard" | "card" => Ok(Self::CreditCard),
            "purchase_orders" | "purchase_order" | "purchaseorder" | "po" => {
                Ok(Self::PurchaseOrder)
            }
            "eft" => Ok(Self::Eft),
            _ => Err(format!("Unknown payment type: {}", s)),
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Settlement status derived from the payment type by the caller's policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementStatus {
    Pending,
    Completed,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per (location, event) monetary totals by payment method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentBuckets {
    pub source_row: usize,
    pub location: String,
    pub event: String,
    pub drawdown: f64,
    pub credit_card: f64,
    pub purchase_orders: f64,
    pub eft: f64,
}

impl PaymentBuckets {
    pub fn amount(&self, payment_type: PaymentType) -> f64 {
        match payment_type {
            PaymentType::Drawdown => self.drawdown,
            PaymentType::CreditCard => self.credit_card,
            PaymentType::PurchaseOrder => self.purchase_orders,
            PaymentType::Eft => self.eft,
        }
    }
}

/// Classification of one (location, event) group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupClassification {
    pub location: String,
    pub event: String,
    /// Sum of the group's monetary totals
    pub box_total: f64,
    /// Highest-priority non-zero bucket equal to the total at penny precision
    pub payment_type: Option<PaymentType>,
    /// Every non-zero bucket equal to the total, in priority order
    pub matching: Vec<PaymentType>,
    /// Whether a payment bucket row existed for this group
    pub has_buckets: bool,
}

impl GroupClassification {
    pub fn is_ambiguous(&self) -> bool {
        self.matching.len() > 1
    }
}

/// A merged row annotated with its group's reconciliation result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledRecord {
    #[serde(flatten)]
    pub record: MergedRecord,
    pub payment_type: Option<PaymentType>,
    pub settlement: Option<SettlementStatus>,
}

/// A composite key that mapped to more than one event id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyCollision {
    pub key: CompositeKey,
    /// The id that was overwritten
    pub previous_event_id: String,
    /// The id that now wins the key
    pub event_id: String,
}
