//! Sync Orchestrator: one supplier config per run, per-product failure
//! isolation, and schedule bookkeeping that always advances.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use stocksync_core::{AppConfig, ChangeOutcome, ChangeReason, SupplierProduct, SupplierSyncConfig};
use stocksync_db::SyncRunRecord;
use stocksync_suppliers::{
    retry_with_backoff, FetchError, SupplierDescriptor, SupplierRegistry,
};
use uuid::Uuid;

use crate::alerts::AlertOutcome;
use crate::error::EngineError;
use crate::gate::due_configs;
use crate::recorder::{record_change, ChangeContext};
use crate::short_id;
use crate::store::StockStore;

/// Knobs for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Hard cap on one adapter call, retries included.
    pub fetch_timeout: Duration,
    pub max_concurrent_fetches: usize,
    pub max_concurrent_suppliers: usize,
    /// In-run retries of transient fetch errors. `0` defers to the next run.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            max_concurrent_fetches: 4,
            max_concurrent_suppliers: 1,
            max_retries: 0,
            backoff_base_ms: 1_000,
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.supplier_request_timeout_secs.max(1)),
            max_concurrent_fetches: config.sync_max_concurrent_fetches.max(1),
            max_concurrent_suppliers: config.sync_max_concurrent_suppliers.max(1),
            max_retries: config.supplier_max_retries,
            backoff_base_ms: config.supplier_retry_backoff_base_ms,
        }
    }
}

/// Summary of one supplier run. Returned even when every product failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRunResult {
    pub config_id: Uuid,
    pub supplier_id: Uuid,
    pub supplier_name: Option<String>,
    pub products_checked: usize,
    pub products_updated: usize,
    pub products_failed: usize,
    pub low_stock_detected: usize,
    pub out_of_stock_detected: usize,
    pub alerts_created: usize,
    pub alerts_resolved: usize,
    /// Set when the run failed as a whole or any product failed.
    pub error: Option<String>,
}

impl SyncRunResult {
    fn empty(config: &SupplierSyncConfig) -> Self {
        Self {
            config_id: config.id,
            supplier_id: config.supplier_id,
            supplier_name: config.supplier_name.clone(),
            products_checked: 0,
            products_updated: 0,
            products_failed: 0,
            low_stock_detected: 0,
            out_of_stock_detected: 0,
            alerts_created: 0,
            alerts_resolved: 0,
            error: None,
        }
    }

    fn failed(config: &SupplierSyncConfig, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::empty(config)
        }
    }
}

/// Totals of one sweep over every user with due configs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub users: usize,
    pub runs: usize,
    pub failed_runs: usize,
}

/// Per-product state at the end of a run.
#[derive(Debug)]
enum ProductOutcome {
    Unchanged,
    Updated {
        transition: ChangeOutcome,
        alert: Option<AlertOutcome>,
        resolved: usize,
    },
    Failed(String),
}

pub struct SyncOrchestrator {
    store: Arc<dyn StockStore>,
    registry: Arc<SupplierRegistry>,
    settings: SyncSettings,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn StockStore>,
        registry: Arc<SupplierRegistry>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            registry,
            settings,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn StockStore> {
        &self.store
    }

    /// Runs every due config of `user_id`, at most
    /// `max_concurrent_suppliers` at a time. A config whose run fails as a
    /// whole shows up as a result with `error` set; siblings are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] only if the due-config query itself fails.
    pub async fn sync_all(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SyncRunResult>, EngineError> {
        let configs = due_configs(self.store.as_ref(), user_id, now).await?;
        tracing::info!(
            user = %short_id(user_id),
            due = configs.len(),
            "sync_all started"
        );

        let runs: Vec<_> = configs
            .into_iter()
            .map(|config| async move {
                match self.run_sync(&config, now).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(
                            config_id = %config.id,
                            supplier_id = %config.supplier_id,
                            error = %e,
                            "sync run bookkeeping failed"
                        );
                        SyncRunResult::failed(&config, e.to_string())
                    }
                }
            })
            .collect();
        let results: Vec<SyncRunResult> = stream::iter(runs)
            .buffered(self.settings.max_concurrent_suppliers.max(1))
            .collect()
            .await;

        Ok(results)
    }

    /// Runs [`Self::sync_all`] for every user owning a due config. A user
    /// whose due-config query fails is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the due-user query fails.
    pub async fn sweep_due_users(&self, now: DateTime<Utc>) -> Result<SweepSummary, EngineError> {
        let users = self.store.list_due_user_ids(now).await?;
        let mut summary = SweepSummary {
            users: users.len(),
            ..SweepSummary::default()
        };

        for user_id in users {
            match self.sync_all(user_id, now).await {
                Ok(results) => {
                    summary.runs += results.len();
                    summary.failed_runs += results.iter().filter(|r| r.error.is_some()).count();
                }
                Err(e) => {
                    tracing::error!(user = %short_id(user_id), error = %e, "sync_all failed");
                }
            }
        }
        Ok(summary)
    }

    /// Runs one config regardless of its due time.
    ///
    /// Product-level failures are counted, not propagated. A run-level
    /// failure (credentials or product list unavailable) is reported in
    /// `SyncRunResult::error`. Either way the run is recorded and
    /// `next_sync_at` advances to `now + sync_frequency_minutes`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] only if the run bookkeeping cannot be written.
    pub async fn run_sync(
        &self,
        config: &SupplierSyncConfig,
        now: DateTime<Utc>,
    ) -> Result<SyncRunResult, EngineError> {
        let result = match self.sync_products(config, now).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    config_id = %config.id,
                    supplier_id = %config.supplier_id,
                    error = %e,
                    "sync run failed"
                );
                SyncRunResult::failed(config, e.to_string())
            }
        };

        let record = SyncRunRecord {
            ran_at: now,
            next_sync_at: config.next_sync_after(now),
            failed: result.error.is_some(),
            last_error: result.error.clone(),
        };
        self.store
            .record_run(config.user_id, config.id, &record)
            .await?;

        tracing::info!(
            config_id = %config.id,
            supplier = config.supplier_name.as_deref().unwrap_or("unknown"),
            checked = result.products_checked,
            updated = result.products_updated,
            failed = result.products_failed,
            low_stock = result.low_stock_detected,
            out_of_stock = result.out_of_stock_detected,
            alerts_created = result.alerts_created,
            "sync run complete"
        );
        Ok(result)
    }

    async fn sync_products(
        &self,
        config: &SupplierSyncConfig,
        now: DateTime<Utc>,
    ) -> Result<SyncRunResult, EngineError> {
        let credentials = self
            .store
            .get_credentials(config.user_id, config.supplier_id)
            .await?;
        let supplier = SupplierDescriptor::resolve(
            config.supplier_id,
            config.supplier_name.clone().unwrap_or_default(),
            config.connector_type.as_deref(),
            credentials,
        );
        let products = self
            .store
            .list_products(config.user_id, config.supplier_id)
            .await?;

        let fetches: Vec<_> = products
            .iter()
            .map(|product| self.sync_product(config, &supplier, product, now))
            .collect();
        let outcomes: Vec<ProductOutcome> = stream::iter(fetches)
            .buffer_unordered(self.settings.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut result = SyncRunResult::empty(config);
        result.products_checked = products.len();
        let mut first_error: Option<String> = None;

        for outcome in outcomes {
            match outcome {
                ProductOutcome::Unchanged => {}
                ProductOutcome::Updated {
                    transition,
                    alert,
                    resolved,
                } => {
                    result.products_updated += 1;
                    match transition {
                        ChangeOutcome::BecameLowStock => result.low_stock_detected += 1,
                        ChangeOutcome::BecameOutOfStock => result.out_of_stock_detected += 1,
                        _ => {}
                    }
                    if alert == Some(AlertOutcome::Created) {
                        result.alerts_created += 1;
                    }
                    result.alerts_resolved += resolved;
                }
                ProductOutcome::Failed(message) => {
                    result.products_failed += 1;
                    first_error.get_or_insert(message);
                }
            }
        }

        if let Some(message) = first_error {
            result.error = Some(format!(
                "{} of {} products failed; first error: {message}",
                result.products_failed, result.products_checked
            ));
        }
        Ok(result)
    }

    async fn sync_product(
        &self,
        config: &SupplierSyncConfig,
        supplier: &SupplierDescriptor,
        product: &SupplierProduct,
        now: DateTime<Utc>,
    ) -> ProductOutcome {
        let fetched = match self.fetch_with_timeout(supplier, &product.external_id).await {
            Ok(quantity) => i32::try_from(quantity).unwrap_or(i32::MAX),
            Err(e) => {
                tracing::warn!(
                    product_id = %product.id,
                    external_id = %product.external_id,
                    connector = %supplier.connector,
                    error = %e,
                    "stock fetch failed"
                );
                return ProductOutcome::Failed(e.to_string());
            }
        };

        match self.apply_quantity(config, product, fetched, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    product_id = %product.id,
                    error = %e,
                    "failed to persist stock change"
                );
                ProductOutcome::Failed(e.to_string())
            }
        }
    }

    async fn fetch_with_timeout(
        &self,
        supplier: &SupplierDescriptor,
        external_id: &str,
    ) -> Result<u32, FetchError> {
        let attempt = retry_with_backoff(
            self.settings.max_retries,
            self.settings.backoff_base_ms,
            || self.registry.fetch_stock(supplier, external_id),
        );
        tokio::time::timeout(self.settings.fetch_timeout, attempt)
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::TransientNetwork(format!(
                    "timed out after {}s",
                    self.settings.fetch_timeout.as_secs()
                )))
            })
    }

    async fn apply_quantity(
        &self,
        config: &SupplierSyncConfig,
        product: &SupplierProduct,
        new: i32,
        now: DateTime<Utc>,
    ) -> Result<ProductOutcome, EngineError> {
        let context = ChangeContext {
            supplier_id: Some(config.supplier_id),
            sync_config_id: Some(config.id),
            threshold: config.low_stock_threshold,
            out_of_stock_action: config.out_of_stock_action,
            reason: ChangeReason::Sync,
            at: now,
        };
        let recorded = record_change(
            self.store.as_ref(),
            product,
            product.stock_quantity,
            new,
            &context,
        )
        .await?;

        if recorded.transition == ChangeOutcome::Unchanged {
            return Ok(ProductOutcome::Unchanged);
        }
        Ok(ProductOutcome::Updated {
            transition: recorded.transition,
            alert: recorded.alert,
            resolved: recorded.alerts_resolved,
        })
    }
}
