//! Reconciliation configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/boxrecon/config/boxrecon.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! API credentials are never read from the file; see
//! [`crate::client::ApiCredentials::from_env`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{PaymentType, SettlementStatus};
use crate::normalize::{LocationPrefix, NormalizeRules};

/// Embedded default config (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/boxrecon.toml");

/// Get the default override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("boxrecon").join("config").join("boxrecon.toml"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub api: ApiConfig,
    pub normalize: NormalizeConfig,
    pub columns: ColumnsConfig,
    pub reconcile: ReconcileConfig,
}

impl ReconConfig {
    /// Load from an explicit path, the data-dir override, or the embedded default
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?,
            None => match default_config_path() {
                Some(default_path) if default_path.exists() => {
                    fs::read_to_string(&default_path).map_err(|e| {
                        Error::Config(format!("Failed to read {}: {}", default_path.display(), e))
                    })?
                }
                _ => DEFAULT_CONFIG.to_string(),
            },
        };

        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ReconConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check that payment type names resolve and the priority order is usable
    pub fn validate(&self) -> Result<()> {
        let priority = self.reconcile.priority()?;
        if priority.is_empty() {
            return Err(Error::Config("reconcile.priority must not be empty".into()));
        }
        for (i, p) in priority.iter().enumerate() {
            if priority[..i].contains(p) {
                return Err(Error::Config(format!(
                    "reconcile.priority lists {} twice",
                    p.as_str()
                )));
            }
        }
        self.reconcile.pending()?;
        if self.api.timeout_secs == 0 {
            return Err(Error::Config("api.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Catering API settings (everything except credentials)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Overridden by BOXRECON_API_URL
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
    /// Refresh the token this long before it expires
    pub token_refresh_skew_secs: u64,
    pub token_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
            max_retries: 1,
            token_refresh_skew_secs: 60,
            token_path: "/oauth/token".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn refresh_skew(&self) -> Duration {
        Duration::from_secs(self.token_refresh_skew_secs)
    }
}

/// Cleaning rules per source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub location_prefixes: Vec<LocationPrefix>,
    pub manual: NormalizeRules,
    pub api: NormalizeRules,
    pub payments: NormalizeRules,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            location_prefixes: vec![LocationPrefix {
                from: "exec ".to_string(),
                to: "executive ".to_string(),
            }],
            manual: NormalizeRules {
                currency_columns: vec!["total".into()],
                forward_fill: vec!["location".into()],
                required: vec!["event".into(), "guest".into(), "total".into()],
                explode_column: Some("event".into()),
                explode_delimiter: "|".into(),
            },
            api: NormalizeRules {
                currency_columns: vec!["unit_price".into()],
                forward_fill: Vec::new(),
                required: vec!["event_id".into(), "menu_item".into()],
                ..NormalizeRules::default()
            },
            payments: NormalizeRules {
                currency_columns: PaymentType::all()
                    .iter()
                    .map(|p| p.as_str().to_string())
                    .collect(),
                forward_fill: vec!["location".into()],
                required: vec!["event".into()],
                ..NormalizeRules::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub manual: ManualColumns,
    pub api: ApiColumns,
    pub payments: PaymentColumns,
}

/// Cleaned column names of the manual preorder/box-log export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualColumns {
    pub location: String,
    pub event: String,
    pub event_date: String,
    pub guest: String,
    pub order_type: String,
    pub ordered_on: String,
    pub total: String,
}

impl Default for ManualColumns {
    fn default() -> Self {
        Self {
            location: "location".into(),
            event: "event".into(),
            event_date: "event_date".into(),
            guest: "guest".into(),
            order_type: "order_type".into(),
            ordered_on: "ordered_on".into(),
            total: "total".into(),
        }
    }
}

/// Cleaned column names of the flattened catering API line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiColumns {
    pub event_id: String,
    pub location: String,
    pub event: String,
    pub kickoff: String,
    pub guest: String,
    pub order_type: String,
    pub menu_item: String,
    pub quantity: String,
    pub unit_price: String,
    pub status: String,
}

impl Default for ApiColumns {
    fn default() -> Self {
        Self {
            event_id: "event_id".into(),
            location: "location".into(),
            event: "event".into(),
            kickoff: "kickoff".into(),
            guest: "guest".into(),
            order_type: "order_type".into(),
            menu_item: "menu_item".into(),
            quantity: "quantity".into(),
            unit_price: "unit_price".into(),
            status: "status".into(),
        }
    }
}

impl ApiColumns {
    /// Header order used when the client flattens API orders into a table
    pub fn header(&self) -> Vec<String> {
        vec![
            self.event_id.clone(),
            self.location.clone(),
            self.event.clone(),
            self.kickoff.clone(),
            self.guest.clone(),
            self.order_type.clone(),
            self.menu_item.clone(),
            self.quantity.clone(),
            self.unit_price.clone(),
            self.status.clone(),
        ]
    }
}

/// Cleaned column names of the consolidated-payment sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentColumns {
    pub location: String,
    pub event: String,
    pub drawdown: String,
    pub credit_card: String,
    pub purchase_orders: String,
    pub eft: String,
}

impl Default for PaymentColumns {
    fn default() -> Self {
        Self {
            location: "location".into(),
            event: "event".into(),
            drawdown: "drawdown".into(),
            credit_card: "credit_card".into(),
            purchase_orders: "purchase_orders".into(),
            eft: "eft".into(),
        }
    }
}

/// Classifier inputs and the caller-owned settlement policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// API line status that rows must carry to be classified
    pub status: Option<String>,
    pub priority: Vec<String>,
    pub pending: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            status: Some("completed".to_string()),
            priority: PaymentType::all()
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            pending: vec![PaymentType::Drawdown.as_str().to_string()],
        }
    }
}

impl ReconcileConfig {
    pub fn priority(&self) -> Result<Vec<PaymentType>> {
        parse_payment_types(&self.priority, "reconcile.priority")
    }

    pub fn pending(&self) -> Result<Vec<PaymentType>> {
        parse_payment_types(&self.pending, "reconcile.pending")
    }

    /// Pending for payment types listed in `pending`, Completed otherwise
    pub fn settlement_for(&self, payment_type: PaymentType) -> SettlementStatus {
        let pending = self.pending().unwrap_or_default();
        if pending.contains(&payment_type) {
            SettlementStatus::Pending
        } else {
            SettlementStatus::Completed
        }
    }
}

fn parse_payment_types(names: &[String], field: &str) -> Result<Vec<PaymentType>> {
    names
        .iter()
        .map(|name| {
            name.parse::<PaymentType>()
                .map_err(|e| Error::Config(format!("{}: {}", field, e)))
        })
        .collect()
}
