//! Read-only alert and history queries.

use stocksync_engine::{PgStore, StockStore};
use uuid::Uuid;

/// Prints the user's active alerts, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_alerts_list(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<()> {
    let store = PgStore::new(pool.clone());
    let alerts = store.list_active_alerts(user_id).await?;

    if alerts.is_empty() {
        println!("no active alerts");
        return Ok(());
    }

    println!(
        "{:<14}{:<10}{:>7}{:>7}  {:<18}MESSAGE",
        "TYPE", "SEVERITY", "STOCK", "LIMIT", "CREATED"
    );
    for alert in &alerts {
        println!(
            "{:<14}{:<10}{:>7}{:>7}  {:<18}{}",
            alert.alert_type.as_str(),
            alert.severity.as_str(),
            alert.current_stock,
            alert.threshold,
            alert.created_at.format("%Y-%m-%d %H:%M"),
            alert.message
        );
    }
    Ok(())
}

/// Prints the most recent `limit` history entries for one product.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_history(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    product_id: Uuid,
    limit: i64,
) -> anyhow::Result<()> {
    let store = PgStore::new(pool.clone());
    let entries = store
        .list_history(user_id, product_id, limit.clamp(1, 500))
        .await?;

    if entries.is_empty() {
        println!("no stock history for product {product_id}");
        return Ok(());
    }

    println!(
        "{:<18}{:>10}{:>10}{:>9}  REASON",
        "WHEN", "PREVIOUS", "NEW", "CHANGE"
    );
    for entry in &entries {
        println!(
            "{:<18}{:>10}{:>10}{:>+9}  {}",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.previous_quantity,
            entry.new_quantity,
            entry.change_amount,
            entry.change_reason.as_str()
        );
    }
    Ok(())
}
