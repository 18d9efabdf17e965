use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use stocksync_core::{
    AlertType, NewStockAlert, StockAlert, StockHistoryEntry, SupplierProduct, SupplierSyncConfig,
};
use stocksync_db::{DbError, StockChange, SyncConfigRow, SyncConfigUpdate, SyncRunRecord};
use stocksync_suppliers::SupplierCredentials;
use uuid::Uuid;

use super::{AppliedStockChange, StockStore};
use crate::error::EngineError;

/// [`StockStore`] over the Postgres schema in `migrations/`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn configs(rows: Vec<SyncConfigRow>) -> Result<Vec<SupplierSyncConfig>, EngineError> {
    rows.into_iter()
        .map(|r| SupplierSyncConfig::try_from(r).map_err(EngineError::from))
        .collect()
}

fn config(row: Option<SyncConfigRow>) -> Result<Option<SupplierSyncConfig>, EngineError> {
    row.map(SupplierSyncConfig::try_from)
        .transpose()
        .map_err(EngineError::from)
}

#[async_trait]
impl StockStore for PgStore {
    async fn list_due_configs(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SupplierSyncConfig>, EngineError> {
        configs(stocksync_db::list_due_sync_configs(&self.pool, user_id, now).await?)
    }

    async fn list_configs(&self, user_id: Uuid) -> Result<Vec<SupplierSyncConfig>, EngineError> {
        configs(stocksync_db::list_sync_configs(&self.pool, user_id).await?)
    }

    async fn get_config(
        &self,
        user_id: Uuid,
        config_id: Uuid,
    ) -> Result<Option<SupplierSyncConfig>, EngineError> {
        config(stocksync_db::get_sync_config(&self.pool, user_id, config_id).await?)
    }

    async fn get_config_by_supplier(
        &self,
        user_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<SupplierSyncConfig>, EngineError> {
        config(stocksync_db::get_sync_config_by_supplier(&self.pool, user_id, supplier_id).await?)
    }

    async fn update_config(
        &self,
        user_id: Uuid,
        config_id: Uuid,
        update: &SyncConfigUpdate,
    ) -> Result<Option<SupplierSyncConfig>, EngineError> {
        config(stocksync_db::update_sync_config(&self.pool, user_id, config_id, update).await?)
    }

    async fn record_run(
        &self,
        user_id: Uuid,
        config_id: Uuid,
        record: &SyncRunRecord,
    ) -> Result<(), EngineError> {
        stocksync_db::record_sync_run(&self.pool, user_id, config_id, record)
            .await
            .map_err(|e| match e {
                DbError::NotFound => EngineError::ConfigNotFound(config_id),
                other => other.into(),
            })
    }

    async fn list_due_user_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, EngineError> {
        Ok(stocksync_db::list_due_user_ids(&self.pool, now).await?)
    }

    async fn list_products(
        &self,
        user_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Vec<SupplierProduct>, EngineError> {
        let rows = stocksync_db::list_supplier_products(&self.pool, user_id, supplier_id).await?;
        Ok(rows.into_iter().map(SupplierProduct::from).collect())
    }

    async fn apply_stock_change(
        &self,
        change: &StockChange,
    ) -> Result<Option<AppliedStockChange>, EngineError> {
        let product_id = change.history.product_id;
        let Some(rows) = stocksync_db::apply_stock_change(&self.pool, change)
            .await
            .map_err(|e| match e {
                DbError::NotFound => EngineError::ProductNotFound(product_id),
                other => other.into(),
            })?
        else {
            return Ok(None);
        };

        Ok(Some(AppliedStockChange {
            history: StockHistoryEntry::try_from(rows.history)?,
            alert: rows.alert.map(StockAlert::try_from).transpose()?,
            alerts_resolved: usize::try_from(rows.alerts_resolved).unwrap_or(usize::MAX),
        }))
    }

    async fn list_history(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        limit: i64,
    ) -> Result<Vec<StockHistoryEntry>, EngineError> {
        stocksync_db::list_stock_history(&self.pool, user_id, product_id, limit)
            .await?
            .into_iter()
            .map(|r| StockHistoryEntry::try_from(r).map_err(EngineError::from))
            .collect()
    }

    async fn find_active_alert(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        alert_type: AlertType,
    ) -> Result<Option<StockAlert>, EngineError> {
        stocksync_db::find_active_alert(&self.pool, user_id, product_id, alert_type)
            .await?
            .map(StockAlert::try_from)
            .transpose()
            .map_err(EngineError::from)
    }

    async fn insert_alert_if_absent(
        &self,
        alert: &NewStockAlert,
    ) -> Result<Option<StockAlert>, EngineError> {
        stocksync_db::insert_alert_if_absent(&self.pool, alert)
            .await?
            .map(StockAlert::try_from)
            .transpose()
            .map_err(EngineError::from)
    }

    async fn list_active_alerts(&self, user_id: Uuid) -> Result<Vec<StockAlert>, EngineError> {
        stocksync_db::list_active_alerts(&self.pool, user_id)
            .await?
            .into_iter()
            .map(|r| StockAlert::try_from(r).map_err(EngineError::from))
            .collect()
    }

    async fn get_credentials(
        &self,
        user_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<SupplierCredentials>, EngineError> {
        let row = stocksync_db::get_supplier_credentials(&self.pool, user_id, supplier_id).await?;
        Ok(row.map(|r| SupplierCredentials {
            api_key: r.api_key,
            access_token: r.access_token,
            username: r.username,
            connector_override: r.connector_override,
        }))
    }
}
