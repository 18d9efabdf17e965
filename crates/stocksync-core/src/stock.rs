use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Tag written to `product_source` for rows owned by `supplier_products`.
pub const PRODUCT_SOURCE_SUPPLIER_PRODUCTS: &str = "supplier_products";

/// What a user wants done with products that go out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfStockAction {
    Hide,
    Flag,
    /// Out-of-stock transitions are recorded but raise no alert.
    Ignore,
}

impl OutOfStockAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hide => "hide",
            Self::Flag => "flag",
            Self::Ignore => "ignore",
        }
    }
}

impl FromStr for OutOfStockAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hide" => Ok(Self::Hide),
            "flag" => Ok(Self::Flag),
            "ignore" => Ok(Self::Ignore),
            other => Err(CoreError::InvalidOutOfStockAction(other.to_string())),
        }
    }
}

impl fmt::Display for OutOfStockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    Sync,
    Manual,
    Order,
}

impl ChangeReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Manual => "manual",
            Self::Order => "order",
        }
    }
}

impl FromStr for ChangeReason {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(Self::Sync),
            "manual" => Ok(Self::Manual),
            "order" => Ok(Self::Order),
            other => Err(CoreError::InvalidChangeReason(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    OutOfStock,
}

impl AlertType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
        }
    }

    /// Severity is a pure function of the alert type; callers never choose it.
    #[must_use]
    pub fn severity(self) -> AlertSeverity {
        match self {
            Self::OutOfStock => AlertSeverity::Critical,
            Self::LowStock => AlertSeverity::Medium,
        }
    }

    /// Alert type for a quantity already at or below the threshold.
    #[must_use]
    pub fn for_quantity(quantity: i32) -> Self {
        if quantity == 0 {
            Self::OutOfStock
        } else {
            Self::LowStock
        }
    }
}

impl FromStr for AlertType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low_stock" => Ok(Self::LowStock),
            "out_of_stock" => Ok(Self::OutOfStock),
            other => Err(CoreError::InvalidAlertType(other.to_string())),
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    Medium,
}

impl AlertSeverity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Medium => "medium",
        }
    }
}

impl FromStr for AlertSeverity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "medium" => Ok(Self::Medium),
            other => Err(CoreError::InvalidAlertSeverity(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Resolved,
}

impl AlertStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "resolved" => Ok(Self::Resolved),
            other => Err(CoreError::InvalidAlertStatus(other.to_string())),
        }
    }
}

/// Per-(user, supplier) schedule and policy record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierSyncConfig {
    pub id: Uuid,
    pub user_id: Uuid,
    pub supplier_id: Uuid,
    pub supplier_name: Option<String>,
    /// Connector key of the supplier (`"bigbuy"`, `"vidaxl"`, ...).
    pub connector_type: Option<String>,
    pub sync_enabled: bool,
    pub sync_frequency_minutes: i32,
    pub low_stock_threshold: i32,
    pub out_of_stock_action: OutOfStockAction,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub next_sync_at: DateTime<Utc>,
    pub total_syncs: i64,
    pub failed_syncs: i64,
    pub last_error: Option<String>,
}

impl SupplierSyncConfig {
    /// `true` when the config is enabled and its next run time has passed.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.sync_enabled && self.next_sync_at <= now
    }

    /// Next run time for a run that happened at `now`.
    #[must_use]
    pub fn next_sync_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::minutes(i64::from(self.sync_frequency_minutes.max(1)))
    }
}

/// A catalog item sourced from one supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierProduct {
    pub id: Uuid,
    pub user_id: Uuid,
    pub supplier_id: Uuid,
    pub external_id: String,
    pub name: String,
    /// Last-known remote stock. Only the sync path writes it.
    pub stock_quantity: i32,
}

/// Immutable audit record of one quantity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub product_source: String,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub change_amount: i32,
    pub change_reason: ChangeReason,
    pub supplier_id: Option<Uuid>,
    pub sync_config_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStockHistoryEntry {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub product_source: String,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub change_reason: ChangeReason,
    pub supplier_id: Option<Uuid>,
    pub sync_config_id: Option<Uuid>,
}

impl NewStockHistoryEntry {
    #[must_use]
    pub fn change_amount(&self) -> i32 {
        self.new_quantity.saturating_sub(self.previous_quantity)
    }
}

/// An unresolved (or resolved) stock condition for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub product_source: String,
    pub product_name: Option<String>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub current_stock: i32,
    pub threshold: i32,
    pub status: AlertStatus,
    pub supplier_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Insert payload for an alert. Severity is derived from `alert_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStockAlert {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub product_source: String,
    pub product_name: Option<String>,
    pub alert_type: AlertType,
    pub message: String,
    pub current_stock: i32,
    pub threshold: i32,
    pub supplier_id: Option<Uuid>,
}

impl NewStockAlert {
    #[must_use]
    pub fn severity(&self) -> AlertSeverity {
        self.alert_type.severity()
    }
}
