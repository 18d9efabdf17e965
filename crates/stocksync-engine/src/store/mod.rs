//! Persistence seam for the sync engine.
//!
//! [`StockStore`] is the single interface the recorder, alert manager,
//! gate and orchestrator write through. [`PgStore`] backs it with Postgres;
//! [`InMemoryStore`] backs it with process memory for tests and dry runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stocksync_core::{
    AlertType, NewStockAlert, StockAlert, StockHistoryEntry, SupplierProduct, SupplierSyncConfig,
};
use stocksync_db::{StockChange, SyncConfigUpdate, SyncRunRecord};
use stocksync_suppliers::SupplierCredentials;
use uuid::Uuid;

use crate::error::EngineError;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// What [`StockStore::apply_stock_change`] wrote.
#[derive(Debug, Clone)]
pub struct AppliedStockChange {
    pub history: StockHistoryEntry,
    /// Set only when a requested alert was inserted.
    pub alert: Option<StockAlert>,
    pub alerts_resolved: usize,
}

#[async_trait]
pub trait StockStore: Send + Sync {
    // -- sync configs --------------------------------------------------------

    /// Enabled configs of `user_id` with `next_sync_at <= now`.
    async fn list_due_configs(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SupplierSyncConfig>, EngineError>;

    async fn list_configs(&self, user_id: Uuid) -> Result<Vec<SupplierSyncConfig>, EngineError>;

    async fn get_config(
        &self,
        user_id: Uuid,
        config_id: Uuid,
    ) -> Result<Option<SupplierSyncConfig>, EngineError>;

    async fn get_config_by_supplier(
        &self,
        user_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<SupplierSyncConfig>, EngineError>;

    /// Applies a partial update; `None` when the config is not the user's.
    async fn update_config(
        &self,
        user_id: Uuid,
        config_id: Uuid,
        update: &SyncConfigUpdate,
    ) -> Result<Option<SupplierSyncConfig>, EngineError>;

    /// Writes run bookkeeping. Counters increment atomically.
    async fn record_run(
        &self,
        user_id: Uuid,
        config_id: Uuid,
        record: &SyncRunRecord,
    ) -> Result<(), EngineError>;

    /// Owners of at least one due config.
    async fn list_due_user_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, EngineError>;

    // -- products ------------------------------------------------------------

    async fn list_products(
        &self,
        user_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Vec<SupplierProduct>, EngineError>;

    /// Writes the cached quantity, its history row and the alert follow-up
    /// as one atomic step. The quantity update only applies while the cached
    /// value still equals `change.history.previous_quantity`; otherwise
    /// nothing is written and `None` is returned.
    async fn apply_stock_change(
        &self,
        change: &StockChange,
    ) -> Result<Option<AppliedStockChange>, EngineError>;

    // -- history -------------------------------------------------------------

    async fn list_history(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        limit: i64,
    ) -> Result<Vec<StockHistoryEntry>, EngineError>;

    // -- alerts --------------------------------------------------------------

    async fn find_active_alert(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        alert_type: AlertType,
    ) -> Result<Option<StockAlert>, EngineError>;

    /// Inserts an active alert unless one already exists for the same
    /// `(user_id, product_id, alert_type)`. The check and the insert are one
    /// atomic step; `None` means an active alert already held the slot.
    async fn insert_alert_if_absent(
        &self,
        alert: &NewStockAlert,
    ) -> Result<Option<StockAlert>, EngineError>;

    async fn list_active_alerts(&self, user_id: Uuid) -> Result<Vec<StockAlert>, EngineError>;

    // -- credentials ---------------------------------------------------------

    async fn get_credentials(
        &self,
        user_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<SupplierCredentials>, EngineError>;
}
