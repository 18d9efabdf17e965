//! Atomic application of one sync-driven stock change.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use stocksync_core::{AlertType, NewStockAlert, NewStockHistoryEntry};

use crate::{
    compare_and_set_stock_quantity, insert_alert_if_absent, insert_stock_history,
    resolve_active_alerts, supplier_product_exists, DbError, StockAlertRow, StockHistoryRow,
};

/// Everything one quantity change writes: the cached stock, its history row,
/// and the alert follow-up chosen for the transition.
#[derive(Debug, Clone)]
pub struct StockChange {
    /// `previous_quantity` doubles as the expected cached value.
    pub history: NewStockHistoryEntry,
    pub alert: Option<NewStockAlert>,
    pub resolve_alerts: Vec<AlertType>,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AppliedStockChangeRows {
    pub history: StockHistoryRow,
    /// `None` when no alert was requested or an active one held the slot.
    pub alert: Option<StockAlertRow>,
    pub alerts_resolved: u64,
}

/// Applies `change` in one transaction.
///
/// The stock update is a compare-and-set on `history.previous_quantity`.
/// Returns `Ok(None)` and writes nothing when another writer already moved
/// the cached quantity.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product does not belong to the user,
/// or [`DbError::Sqlx`] if any statement fails. Nothing is committed on error.
pub async fn apply_stock_change(
    pool: &PgPool,
    change: &StockChange,
) -> Result<Option<AppliedStockChangeRows>, DbError> {
    let entry = &change.history;
    let mut tx = pool.begin().await?;

    let updated = compare_and_set_stock_quantity(
        &mut *tx,
        entry.user_id,
        entry.product_id,
        entry.previous_quantity,
        entry.new_quantity,
    )
    .await?;
    if !updated {
        let exists = supplier_product_exists(&mut *tx, entry.user_id, entry.product_id).await?;
        tx.rollback().await?;
        return if exists {
            Ok(None)
        } else {
            Err(DbError::NotFound)
        };
    }

    let history = insert_stock_history(&mut *tx, entry).await?;

    let alert = match &change.alert {
        Some(alert) => insert_alert_if_absent(&mut *tx, alert).await?,
        None => None,
    };

    let alerts_resolved = if change.resolve_alerts.is_empty() {
        0
    } else {
        resolve_active_alerts(
            &mut *tx,
            entry.user_id,
            entry.product_id,
            &change.resolve_alerts,
            change.resolved_at,
        )
        .await?
    };

    tx.commit().await?;
    Ok(Some(AppliedStockChangeRows {
        history,
        alert,
        alerts_resolved,
    }))
}
