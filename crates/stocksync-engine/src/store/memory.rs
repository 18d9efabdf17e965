use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stocksync_core::{
    AlertStatus, AlertType, NewStockAlert, StockAlert, StockHistoryEntry, SupplierProduct,
    SupplierSyncConfig,
};
use stocksync_db::{StockChange, SyncConfigUpdate, SyncRunRecord};
use stocksync_suppliers::SupplierCredentials;
use uuid::Uuid;

use super::{AppliedStockChange, StockStore};
use crate::error::EngineError;

#[derive(Default)]
struct State {
    configs: HashMap<Uuid, SupplierSyncConfig>,
    products: HashMap<Uuid, SupplierProduct>,
    history: Vec<StockHistoryEntry>,
    alerts: Vec<StockAlert>,
    credentials: HashMap<(Uuid, Uuid), SupplierCredentials>,
    broken_suppliers: HashSet<Uuid>,
    failing_stock_changes: usize,
}

impl State {
    fn push_alert_if_absent(&mut self, alert: &NewStockAlert) -> Option<StockAlert> {
        let occupied = self.alerts.iter().any(|a| {
            a.user_id == alert.user_id
                && a.product_id == alert.product_id
                && a.alert_type == alert.alert_type
                && a.status == AlertStatus::Active
        });
        if occupied {
            return None;
        }

        let row = StockAlert {
            id: Uuid::new_v4(),
            user_id: alert.user_id,
            product_id: alert.product_id,
            product_source: alert.product_source.clone(),
            product_name: alert.product_name.clone(),
            alert_type: alert.alert_type,
            severity: alert.severity(),
            message: alert.message.clone(),
            current_stock: alert.current_stock,
            threshold: alert.threshold,
            status: AlertStatus::Active,
            supplier_id: alert.supplier_id,
            created_at: Utc::now(),
            resolved_at: None,
        };
        self.alerts.push(row.clone());
        Some(row)
    }

    fn resolve_alerts(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
        alert_types: &[AlertType],
        resolved_at: DateTime<Utc>,
    ) -> usize {
        let mut resolved = 0;
        for alert in self.alerts.iter_mut().filter(|a| {
            a.user_id == user_id
                && a.product_id == product_id
                && a.status == AlertStatus::Active
                && alert_types.contains(&a.alert_type)
        }) {
            alert.status = AlertStatus::Resolved;
            alert.resolved_at = Some(resolved_at);
            resolved += 1;
        }
        resolved
    }
}

/// Process-memory [`StockStore`].
///
/// Intended for tests and dry runs. Every operation takes the single lock
/// for its whole duration, so `insert_alert_if_absent` and
/// `apply_stock_change` are atomic the same way the partial unique index and
/// the transaction make them atomic in Postgres.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, EngineError> {
        self.state
            .read()
            .map_err(|_| EngineError::Store("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, EngineError> {
        self.state
            .write()
            .map_err(|_| EngineError::Store("lock poisoned".to_string()))
    }

    // -- seeding and inspection ---------------------------------------------

    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the lock is poisoned.
    pub fn insert_config(&self, config: SupplierSyncConfig) -> Result<(), EngineError> {
        self.write()?.configs.insert(config.id, config);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the lock is poisoned.
    pub fn insert_product(&self, product: SupplierProduct) -> Result<(), EngineError> {
        self.write()?.products.insert(product.id, product);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the lock is poisoned.
    pub fn insert_credentials(
        &self,
        user_id: Uuid,
        supplier_id: Uuid,
        credentials: SupplierCredentials,
    ) -> Result<(), EngineError> {
        self.write()?
            .credentials
            .insert((user_id, supplier_id), credentials);
        Ok(())
    }

    /// Makes `list_products` fail for `supplier_id`, simulating a store
    /// outage for one supplier.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the lock is poisoned.
    pub fn break_product_listing(&self, supplier_id: Uuid) -> Result<(), EngineError> {
        self.write()?.broken_suppliers.insert(supplier_id);
        Ok(())
    }

    /// Makes the next `count` calls to `apply_stock_change` fail before
    /// writing anything, simulating a failed history insert.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the lock is poisoned.
    pub fn fail_next_stock_changes(&self, count: usize) -> Result<(), EngineError> {
        self.write()?.failing_stock_changes = count;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the lock is poisoned.
    pub fn product(&self, product_id: Uuid) -> Result<Option<SupplierProduct>, EngineError> {
        Ok(self.read()?.products.get(&product_id).cloned())
    }

    /// Every history row in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the lock is poisoned.
    pub fn history(&self) -> Result<Vec<StockHistoryEntry>, EngineError> {
        Ok(self.read()?.history.clone())
    }

    /// Every alert, active or resolved, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the lock is poisoned.
    pub fn alerts(&self) -> Result<Vec<StockAlert>, EngineError> {
        Ok(self.read()?.alerts.clone())
    }
}

fn sorted_configs<'a>(it: impl Iterator<Item = &'a SupplierSyncConfig>) -> Vec<SupplierSyncConfig> {
    let mut out: Vec<SupplierSyncConfig> = it.cloned().collect();
    out.sort_by(|a, b| a.next_sync_at.cmp(&b.next_sync_at).then(a.id.cmp(&b.id)));
    out
}

#[async_trait]
impl StockStore for InMemoryStore {
    async fn list_due_configs(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SupplierSyncConfig>, EngineError> {
        let state = self.read()?;
        Ok(sorted_configs(
            state
                .configs
                .values()
                .filter(|c| c.user_id == user_id && c.is_due(now)),
        ))
    }

    async fn list_configs(&self, user_id: Uuid) -> Result<Vec<SupplierSyncConfig>, EngineError> {
        let state = self.read()?;
        Ok(sorted_configs(
            state.configs.values().filter(|c| c.user_id == user_id),
        ))
    }

    async fn get_config(
        &self,
        user_id: Uuid,
        config_id: Uuid,
    ) -> Result<Option<SupplierSyncConfig>, EngineError> {
        let state = self.read()?;
        Ok(state
            .configs
            .get(&config_id)
            .filter(|c| c.user_id == user_id)
            .cloned())
    }

    async fn get_config_by_supplier(
        &self,
        user_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<SupplierSyncConfig>, EngineError> {
        let state = self.read()?;
        Ok(state
            .configs
            .values()
            .find(|c| c.user_id == user_id && c.supplier_id == supplier_id)
            .cloned())
    }

    async fn update_config(
        &self,
        user_id: Uuid,
        config_id: Uuid,
        update: &SyncConfigUpdate,
    ) -> Result<Option<SupplierSyncConfig>, EngineError> {
        let mut state = self.write()?;
        let Some(config) = state
            .configs
            .get_mut(&config_id)
            .filter(|c| c.user_id == user_id)
        else {
            return Ok(None);
        };

        if let Some(enabled) = update.sync_enabled {
            config.sync_enabled = enabled;
        }
        if let Some(freq) = update.sync_frequency_minutes {
            config.sync_frequency_minutes = freq;
        }
        if let Some(threshold) = update.low_stock_threshold {
            config.low_stock_threshold = threshold;
        }
        if let Some(action) = update.out_of_stock_action {
            config.out_of_stock_action = action;
        }
        if let Some(next) = update.next_sync_at {
            config.next_sync_at = next;
        }
        Ok(Some(config.clone()))
    }

    async fn record_run(
        &self,
        user_id: Uuid,
        config_id: Uuid,
        record: &SyncRunRecord,
    ) -> Result<(), EngineError> {
        let mut state = self.write()?;
        let config = state
            .configs
            .get_mut(&config_id)
            .filter(|c| c.user_id == user_id)
            .ok_or(EngineError::ConfigNotFound(config_id))?;

        config.last_sync_at = Some(record.ran_at);
        config.next_sync_at = record.next_sync_at;
        config.total_syncs += 1;
        if record.failed {
            config.failed_syncs += 1;
        }
        config.last_error.clone_from(&record.last_error);
        Ok(())
    }

    async fn list_due_user_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, EngineError> {
        let state = self.read()?;
        let mut ids: Vec<Uuid> = state
            .configs
            .values()
            .filter(|c| c.is_due(now))
            .map(|c| c.user_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn list_products(
        &self,
        user_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Vec<SupplierProduct>, EngineError> {
        let state = self.read()?;
        if state.broken_suppliers.contains(&supplier_id) {
            return Err(EngineError::Store(format!(
                "product listing unavailable for supplier {supplier_id}"
            )));
        }
        let mut products: Vec<SupplierProduct> = state
            .products
            .values()
            .filter(|p| p.user_id == user_id && p.supplier_id == supplier_id)
            .cloned()
            .collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    async fn apply_stock_change(
        &self,
        change: &StockChange,
    ) -> Result<Option<AppliedStockChange>, EngineError> {
        let entry = &change.history;
        let mut state = self.write()?;
        let current = state
            .products
            .get(&entry.product_id)
            .filter(|p| p.user_id == entry.user_id)
            .map(|p| p.stock_quantity)
            .ok_or(EngineError::ProductNotFound(entry.product_id))?;
        if current != entry.previous_quantity {
            return Ok(None);
        }
        if state.failing_stock_changes > 0 {
            state.failing_stock_changes -= 1;
            return Err(EngineError::Store("stock history insert failed".to_string()));
        }

        if let Some(product) = state.products.get_mut(&entry.product_id) {
            product.stock_quantity = entry.new_quantity.max(0);
        }
        let history = StockHistoryEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            product_id: entry.product_id,
            product_source: entry.product_source.clone(),
            previous_quantity: entry.previous_quantity,
            new_quantity: entry.new_quantity,
            change_amount: entry.change_amount(),
            change_reason: entry.change_reason,
            supplier_id: entry.supplier_id,
            sync_config_id: entry.sync_config_id,
            created_at: Utc::now(),
        };
        state.history.push(history.clone());

        let alert = change
            .alert
            .as_ref()
            .and_then(|alert| state.push_alert_if_absent(alert));
        let alerts_resolved = state.resolve_alerts(
            entry.user_id,
            entry.product_id,
            &change.resolve_alerts,
            change.resolved_at,
        );

        Ok(Some(AppliedStockChange {
            history,
            alert,
            alerts_resolved,
        }))
    }

    async fn list_history(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        limit: i64,
    ) -> Result<Vec<StockHistoryEntry>, EngineError> {
        let state = self.read()?;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|h| h.user_id == user_id && h.product_id == product_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_active_alert(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        alert_type: AlertType,
    ) -> Result<Option<StockAlert>, EngineError> {
        let state = self.read()?;
        Ok(state
            .alerts
            .iter()
            .find(|a| {
                a.user_id == user_id
                    && a.product_id == product_id
                    && a.alert_type == alert_type
                    && a.status == AlertStatus::Active
            })
            .cloned())
    }

    async fn insert_alert_if_absent(
        &self,
        alert: &NewStockAlert,
    ) -> Result<Option<StockAlert>, EngineError> {
        Ok(self.write()?.push_alert_if_absent(alert))
    }

    async fn list_active_alerts(&self, user_id: Uuid) -> Result<Vec<StockAlert>, EngineError> {
        let state = self.read()?;
        Ok(state
            .alerts
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id && a.status == AlertStatus::Active)
            .cloned()
            .collect())
    }

    async fn get_credentials(
        &self,
        user_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<SupplierCredentials>, EngineError> {
        Ok(self
            .read()?
            .credentials
            .get(&(user_id, supplier_id))
            .cloned())
    }
}
