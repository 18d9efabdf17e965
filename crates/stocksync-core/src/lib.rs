//! Shared domain types and configuration for the stock synchronization
//! pipeline.

pub mod app_config;
pub mod config;
pub mod stock;
pub mod transition;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use stock::{
    AlertSeverity, AlertStatus, AlertType, ChangeReason, NewStockAlert, NewStockHistoryEntry,
    OutOfStockAction, StockAlert, StockHistoryEntry, SupplierProduct, SupplierSyncConfig,
    PRODUCT_SOURCE_SUPPLIER_PRODUCTS,
};
pub use transition::{classify_transition, ChangeOutcome};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid out_of_stock_action: {0}")]
    InvalidOutOfStockAction(String),

    #[error("invalid alert type: {0}")]
    InvalidAlertType(String),

    #[error("invalid alert status: {0}")]
    InvalidAlertStatus(String),

    #[error("invalid alert severity: {0}")]
    InvalidAlertSeverity(String),

    #[error("invalid change reason: {0}")]
    InvalidChangeReason(String),
}
