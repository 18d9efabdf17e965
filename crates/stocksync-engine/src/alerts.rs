//! Alert Manager: the only writer of `stock_alerts`.
//!
//! At most one active alert exists per `(user, product, alert type)`. The
//! pre-check avoids a write in the common case; the store's atomic
//! insert-if-absent closes the race between two concurrent checks.
//!
//! Alerts that follow a sync-driven quantity change are planned here with
//! [`plan_alert`] and written in the same atomic step as the change itself
//! (see [`crate::recorder`]).

use serde::Serialize;
use stocksync_core::{
    AlertType, NewStockAlert, OutOfStockAction, StockAlert, SupplierProduct,
    PRODUCT_SOURCE_SUPPLIER_PRODUCTS,
};
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::StockStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertOutcome {
    Created,
    AlreadyActive,
    /// Policy suppressed the alert (`out_of_stock_action = ignore`).
    Skipped,
}

impl AlertOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AlreadyActive => "already_active",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertRequest<'a> {
    pub product: &'a SupplierProduct,
    pub alert_type: AlertType,
    pub current_stock: i32,
    pub threshold: i32,
    pub supplier_id: Option<Uuid>,
    pub out_of_stock_action: OutOfStockAction,
}

#[must_use]
pub fn alert_message(alert_type: AlertType, product_name: &str, current_stock: i32) -> String {
    match alert_type {
        AlertType::OutOfStock => format!("Out of stock: {product_name}"),
        AlertType::LowStock => format!("Low stock ({current_stock} units): {product_name}"),
    }
}

/// Alert types a `Recovered` transition resolves.
pub const RECOVERY_RESOLVES: [AlertType; 2] = [AlertType::LowStock, AlertType::OutOfStock];

/// Builds the alert `request` asks for, or `None` when the config's
/// out-of-stock policy suppresses it.
#[must_use]
pub fn plan_alert(request: &AlertRequest<'_>) -> Option<NewStockAlert> {
    if request.alert_type == AlertType::OutOfStock
        && request.out_of_stock_action == OutOfStockAction::Ignore
    {
        return None;
    }

    let product = request.product;
    Some(NewStockAlert {
        user_id: product.user_id,
        product_id: product.id,
        product_source: PRODUCT_SOURCE_SUPPLIER_PRODUCTS.to_string(),
        product_name: Some(product.name.clone()),
        alert_type: request.alert_type,
        message: alert_message(request.alert_type, &product.name, request.current_stock),
        current_stock: request.current_stock,
        threshold: request.threshold,
        supplier_id: request.supplier_id,
    })
}

/// Creates the alert unless an active one of the same type already exists.
///
/// # Errors
///
/// Returns [`EngineError`] if the store fails.
pub async fn ensure_alert<S: StockStore + ?Sized>(
    store: &S,
    request: &AlertRequest<'_>,
) -> Result<AlertOutcome, EngineError> {
    let Some(alert) = plan_alert(request) else {
        return Ok(AlertOutcome::Skipped);
    };

    if store
        .find_active_alert(alert.user_id, alert.product_id, alert.alert_type)
        .await?
        .is_some()
    {
        return Ok(AlertOutcome::AlreadyActive);
    }

    match store.insert_alert_if_absent(&alert).await? {
        Some(created) => {
            log_created(&created);
            Ok(AlertOutcome::Created)
        }
        // Lost the race to a concurrent writer.
        None => Ok(AlertOutcome::AlreadyActive),
    }
}

pub(crate) fn log_created(alert: &StockAlert) {
    tracing::info!(
        alert_id = %alert.id,
        product_id = %alert.product_id,
        alert_type = %alert.alert_type,
        current_stock = alert.current_stock,
        "stock alert created"
    );
}

/// One product examined by [`check_alerts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertCheck {
    pub product_id: Uuid,
    pub product_name: String,
    pub stock: i32,
    pub alert_type: AlertType,
    pub outcome: AlertOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSweep {
    pub alerts_created: usize,
    pub alerts: Vec<AlertCheck>,
}

/// Reconciliation sweep over every config of `user_id`: any product already
/// at or below its config's threshold gets an alert unless one is active.
/// Independent of sync runs; reads cached stock only.
///
/// # Errors
///
/// Returns [`EngineError`] if the store fails.
pub async fn check_alerts<S: StockStore + ?Sized>(
    store: &S,
    user_id: Uuid,
) -> Result<AlertSweep, EngineError> {
    let mut sweep = AlertSweep::default();

    for config in store.list_configs(user_id).await? {
        let products = store.list_products(user_id, config.supplier_id).await?;
        for product in products
            .iter()
            .filter(|p| p.stock_quantity <= config.low_stock_threshold)
        {
            let alert_type = AlertType::for_quantity(product.stock_quantity);
            let outcome = ensure_alert(
                store,
                &AlertRequest {
                    product,
                    alert_type,
                    current_stock: product.stock_quantity,
                    threshold: config.low_stock_threshold,
                    supplier_id: Some(config.supplier_id),
                    out_of_stock_action: config.out_of_stock_action,
                },
            )
            .await?;
            if outcome == AlertOutcome::Created {
                sweep.alerts_created += 1;
            }
            sweep.alerts.push(AlertCheck {
                product_id: product.id,
                product_name: product.name.clone(),
                stock: product.stock_quantity,
                alert_type,
                outcome,
            });
        }
    }

    tracing::info!(
        checked = sweep.alerts.len(),
        created = sweep.alerts_created,
        "alert sweep complete"
    );
    Ok(sweep)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use stocksync_core::{AlertSeverity, AlertStatus};

    use super::*;
    use crate::store::InMemoryStore;

    fn product() -> SupplierProduct {
        SupplierProduct {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            external_id: "SKU-9".to_string(),
            name: "Garden Bench".to_string(),
            stock_quantity: 0,
        }
    }

    fn request(product: &SupplierProduct, alert_type: AlertType) -> AlertRequest<'_> {
        AlertRequest {
            product,
            alert_type,
            current_stock: if alert_type == AlertType::OutOfStock { 0 } else { 4 },
            threshold: 10,
            supplier_id: Some(product.supplier_id),
            out_of_stock_action: OutOfStockAction::Flag,
        }
    }

    #[test]
    fn messages_match_alert_type() {
        assert_eq!(
            alert_message(AlertType::OutOfStock, "Lamp", 0),
            "Out of stock: Lamp"
        );
        assert_eq!(
            alert_message(AlertType::LowStock, "Lamp", 3),
            "Low stock (3 units): Lamp"
        );
    }

    #[tokio::test]
    async fn first_call_creates_second_is_already_active() {
        let store = InMemoryStore::new();
        let p = product();
        let req = request(&p, AlertType::OutOfStock);

        assert_eq!(ensure_alert(&store, &req).await.unwrap(), AlertOutcome::Created);
        assert_eq!(
            ensure_alert(&store, &req).await.unwrap(),
            AlertOutcome::AlreadyActive
        );

        let alerts = store.alerts().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].product_name.as_deref(), Some("Garden Bench"));
    }

    #[tokio::test]
    async fn ignore_policy_skips_out_of_stock_only() {
        let store = InMemoryStore::new();
        let p = product();
        let mut req = request(&p, AlertType::OutOfStock);
        req.out_of_stock_action = OutOfStockAction::Ignore;
        assert_eq!(ensure_alert(&store, &req).await.unwrap(), AlertOutcome::Skipped);

        let mut low = request(&p, AlertType::LowStock);
        low.out_of_stock_action = OutOfStockAction::Ignore;
        assert_eq!(ensure_alert(&store, &low).await.unwrap(), AlertOutcome::Created);
        assert_eq!(store.alerts().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_calls_leave_one_active_alert() {
        let store = Arc::new(InMemoryStore::new());
        let p = Arc::new(product());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let p = Arc::clone(&p);
                tokio::spawn(async move {
                    ensure_alert(store.as_ref(), &request(&p, AlertType::LowStock))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut created = 0;
        for h in handles {
            if h.await.unwrap() == AlertOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        let active = store
            .alerts()
            .unwrap()
            .into_iter()
            .filter(|a| a.status == AlertStatus::Active)
            .count();
        assert_eq!(active, 1);
    }

    #[test]
    fn plan_honours_ignore_policy_for_out_of_stock_only() {
        let p = product();
        let mut out = request(&p, AlertType::OutOfStock);
        out.out_of_stock_action = OutOfStockAction::Ignore;
        assert!(plan_alert(&out).is_none());

        let mut low = request(&p, AlertType::LowStock);
        low.out_of_stock_action = OutOfStockAction::Ignore;
        let planned = plan_alert(&low).unwrap();
        assert_eq!(planned.message, "Low stock (4 units): Garden Bench");
        assert_eq!(planned.severity(), AlertSeverity::Medium);
    }

    #[tokio::test]
    async fn sweep_alerts_products_at_or_below_threshold_once() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let supplier = Uuid::new_v4();
        store
            .insert_config(stocksync_core::SupplierSyncConfig {
                id: Uuid::new_v4(),
                user_id: user,
                supplier_id: supplier,
                supplier_name: Some("VidaXL".to_string()),
                connector_type: Some("vidaxl".to_string()),
                sync_enabled: true,
                sync_frequency_minutes: 60,
                low_stock_threshold: 10,
                out_of_stock_action: OutOfStockAction::Flag,
                last_sync_at: None,
                next_sync_at: Utc::now(),
                total_syncs: 0,
                failed_syncs: 0,
                last_error: None,
            })
            .unwrap();
        for (sku, qty) in [("A", 0), ("B", 10), ("C", 11)] {
            store
                .insert_product(SupplierProduct {
                    id: Uuid::new_v4(),
                    user_id: user,
                    supplier_id: supplier,
                    external_id: sku.to_string(),
                    name: format!("Item {sku}"),
                    stock_quantity: qty,
                })
                .unwrap();
        }

        let first = check_alerts(&store, user).await.unwrap();
        assert_eq!(first.alerts_created, 2);
        assert_eq!(first.alerts.len(), 2);
        let types: Vec<AlertType> = first.alerts.iter().map(|a| a.alert_type).collect();
        assert!(types.contains(&AlertType::OutOfStock));
        assert!(types.contains(&AlertType::LowStock));

        let second = check_alerts(&store, user).await.unwrap();
        assert_eq!(second.alerts_created, 0);
        assert!(second
            .alerts
            .iter()
            .all(|a| a.outcome == AlertOutcome::AlreadyActive));
        assert_eq!(store.alerts().unwrap().len(), 2);
    }
}
