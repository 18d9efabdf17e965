//! Change Recorder: writes one history row per real quantity change and
//! classifies the transition.
//!
//! The cached quantity, its history row, and the alert writes the transition
//! calls for land together through [`StockStore::apply_stock_change`]. A
//! change planned against a quantity that has since moved writes nothing.

use chrono::{DateTime, Utc};
use stocksync_core::{
    classify_transition, AlertType, ChangeOutcome, ChangeReason, NewStockHistoryEntry,
    OutOfStockAction, SupplierProduct, PRODUCT_SOURCE_SUPPLIER_PRODUCTS,
};
use stocksync_db::StockChange;
use uuid::Uuid;

use crate::alerts::{log_created, plan_alert, AlertOutcome, AlertRequest, RECOVERY_RESOLVES};
use crate::error::EngineError;
use crate::store::StockStore;

/// Who and what caused a change.
#[derive(Debug, Clone)]
pub struct ChangeContext {
    pub supplier_id: Option<Uuid>,
    pub sync_config_id: Option<Uuid>,
    pub threshold: i32,
    pub out_of_stock_action: OutOfStockAction,
    pub reason: ChangeReason,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedChange {
    pub transition: ChangeOutcome,
    pub alert: Option<AlertOutcome>,
    pub alerts_resolved: usize,
}

impl RecordedChange {
    fn unchanged() -> Self {
        Self {
            transition: ChangeOutcome::Unchanged,
            alert: None,
            alerts_resolved: 0,
        }
    }
}

/// Records the move from `previous` to `new` for `product`.
///
/// Returns [`ChangeOutcome::Unchanged`] without writing when the quantities
/// are equal, or when the cached quantity is no longer `previous`.
///
/// # Errors
///
/// Returns [`EngineError`] if the store fails; nothing is written then.
pub async fn record_change<S: StockStore + ?Sized>(
    store: &S,
    product: &SupplierProduct,
    previous: i32,
    new: i32,
    context: &ChangeContext,
) -> Result<RecordedChange, EngineError> {
    let transition = classify_transition(previous, new, context.threshold);
    if !transition.is_change() {
        return Ok(RecordedChange::unchanged());
    }

    let alert_type = match transition {
        ChangeOutcome::BecameOutOfStock => Some(AlertType::OutOfStock),
        ChangeOutcome::BecameLowStock => Some(AlertType::LowStock),
        _ => None,
    };
    let planned = alert_type.map(|alert_type| {
        plan_alert(&AlertRequest {
            product,
            alert_type,
            current_stock: new,
            threshold: context.threshold,
            supplier_id: context.supplier_id,
            out_of_stock_action: context.out_of_stock_action,
        })
    });
    let suppressed = matches!(planned, Some(None));

    let change = StockChange {
        history: NewStockHistoryEntry {
            user_id: product.user_id,
            product_id: product.id,
            product_source: PRODUCT_SOURCE_SUPPLIER_PRODUCTS.to_string(),
            previous_quantity: previous,
            new_quantity: new,
            change_reason: context.reason,
            supplier_id: context.supplier_id,
            sync_config_id: context.sync_config_id,
        },
        alert: planned.flatten(),
        resolve_alerts: if transition == ChangeOutcome::Recovered {
            RECOVERY_RESOLVES.to_vec()
        } else {
            Vec::new()
        },
        resolved_at: context.at,
    };

    let Some(applied) = store.apply_stock_change(&change).await? else {
        tracing::debug!(
            product_id = %product.id,
            previous,
            new,
            "cached stock moved concurrently; change not applied"
        );
        return Ok(RecordedChange::unchanged());
    };

    let alert = match (&applied.alert, change.alert.is_some()) {
        (Some(created), _) => {
            log_created(created);
            Some(AlertOutcome::Created)
        }
        (None, true) => Some(AlertOutcome::AlreadyActive),
        (None, false) if suppressed => Some(AlertOutcome::Skipped),
        (None, false) => None,
    };
    if applied.alerts_resolved > 0 {
        tracing::info!(
            product_id = %product.id,
            resolved = applied.alerts_resolved,
            "stock alerts resolved on recovery"
        );
    }

    tracing::debug!(
        product_id = %product.id,
        previous,
        new,
        ?transition,
        "recorded stock change"
    );
    Ok(RecordedChange {
        transition,
        alert,
        alerts_resolved: applied.alerts_resolved,
    })
}

#[cfg(test)]
mod tests {
    use stocksync_core::AlertStatus;

    use super::*;
    use crate::store::InMemoryStore;

    fn product(stock: i32) -> SupplierProduct {
        SupplierProduct {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            external_id: "SKU-1".to_string(),
            name: "Desk Lamp".to_string(),
            stock_quantity: stock,
        }
    }

    fn context() -> ChangeContext {
        ChangeContext {
            supplier_id: None,
            sync_config_id: None,
            threshold: 10,
            out_of_stock_action: OutOfStockAction::Flag,
            reason: ChangeReason::Sync,
            at: Utc::now(),
        }
    }

    fn stored(store: &InMemoryStore, stock: i32) -> SupplierProduct {
        let p = product(stock);
        store.insert_product(p.clone()).unwrap();
        p
    }

    #[tokio::test]
    async fn equal_quantities_write_nothing_even_when_repeated() {
        let store = InMemoryStore::new();
        let p = stored(&store, 20);
        for _ in 0..2 {
            let recorded = record_change(&store, &p, 20, 20, &context()).await.unwrap();
            assert_eq!(recorded.transition, ChangeOutcome::Unchanged);
        }
        assert!(store.history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn change_writes_quantity_history_and_alert_together() {
        let store = InMemoryStore::new();
        let p = stored(&store, 50);
        let recorded = record_change(&store, &p, 50, 8, &context()).await.unwrap();
        assert_eq!(recorded.transition, ChangeOutcome::BecameLowStock);
        assert_eq!(recorded.alert, Some(AlertOutcome::Created));

        let history = store.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].change_amount, -42);
        assert_eq!(history[0].product_source, PRODUCT_SOURCE_SUPPLIER_PRODUCTS);
        assert_eq!(history[0].change_reason, ChangeReason::Sync);
        assert_eq!(store.product(p.id).unwrap().unwrap().stock_quantity, 8);
        assert_eq!(store.alerts().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_previous_quantity_is_reported_unchanged() {
        let store = InMemoryStore::new();
        let p = stored(&store, 50);
        record_change(&store, &p, 50, 8, &context()).await.unwrap();

        // Second writer planned against the same snapshot.
        let recorded = record_change(&store, &p, 50, 8, &context()).await.unwrap();
        assert_eq!(recorded, RecordedChange::unchanged());
        assert_eq!(store.history().unwrap().len(), 1);
        assert_eq!(store.alerts().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_change_leaves_no_partial_write() {
        let store = InMemoryStore::new();
        let p = stored(&store, 50);
        store.fail_next_stock_changes(1).unwrap();

        assert!(record_change(&store, &p, 50, 0, &context()).await.is_err());
        assert_eq!(store.product(p.id).unwrap().unwrap().stock_quantity, 50);
        assert!(store.history().unwrap().is_empty());
        assert!(store.alerts().unwrap().is_empty());

        let recorded = record_change(&store, &p, 50, 0, &context()).await.unwrap();
        assert_eq!(recorded.transition, ChangeOutcome::BecameOutOfStock);
        assert_eq!(recorded.alert, Some(AlertOutcome::Created));
        assert_eq!(store.history().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ignore_policy_records_history_without_alert() {
        let store = InMemoryStore::new();
        let p = stored(&store, 5);
        let mut ctx = context();
        ctx.out_of_stock_action = OutOfStockAction::Ignore;

        let recorded = record_change(&store, &p, 5, 0, &ctx).await.unwrap();
        assert_eq!(recorded.alert, Some(AlertOutcome::Skipped));
        assert_eq!(store.history().unwrap().len(), 1);
        assert!(store.alerts().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recovery_resolves_active_alerts() {
        let store = InMemoryStore::new();
        let p = stored(&store, 50);
        record_change(&store, &p, 50, 0, &context()).await.unwrap();

        let recorded = record_change(&store, &p, 0, 40, &context()).await.unwrap();
        assert_eq!(recorded.transition, ChangeOutcome::Recovered);
        assert_eq!(recorded.alerts_resolved, 1);
        assert!(store
            .alerts()
            .unwrap()
            .iter()
            .all(|a| a.status == AlertStatus::Resolved));
    }
}
