//! Append-only writes and reads for `stock_history`.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use stocksync_core::{NewStockHistoryEntry, StockHistoryEntry};
use uuid::Uuid;

use crate::{parse_column, DbError};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockHistoryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub product_source: String,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub change_amount: i32,
    pub change_reason: String,
    pub supplier_id: Option<Uuid>,
    pub sync_config_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<StockHistoryRow> for StockHistoryEntry {
    type Error = DbError;

    fn try_from(row: StockHistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            product_source: row.product_source,
            previous_quantity: row.previous_quantity,
            new_quantity: row.new_quantity,
            change_amount: row.change_amount,
            change_reason: parse_column("change_reason", &row.change_reason)?,
            supplier_id: row.supplier_id,
            sync_config_id: row.sync_config_id,
            created_at: row.created_at,
        })
    }
}

/// Appends one history row. `change_amount` is derived from the quantities.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_stock_history<'e, E>(
    executor: E,
    entry: &NewStockHistoryEntry,
) -> Result<StockHistoryRow, DbError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, StockHistoryRow>(
        "INSERT INTO stock_history \
             (id, user_id, product_id, product_source, previous_quantity, new_quantity, \
              change_amount, change_reason, supplier_id, sync_config_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING id, user_id, product_id, product_source, previous_quantity, new_quantity, \
                   change_amount, change_reason, supplier_id, sync_config_id, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(entry.user_id)
    .bind(entry.product_id)
    .bind(&entry.product_source)
    .bind(entry.previous_quantity)
    .bind(entry.new_quantity)
    .bind(entry.change_amount())
    .bind(entry.change_reason.as_str())
    .bind(entry.supplier_id)
    .bind(entry.sync_config_id)
    .fetch_one(executor)
    .await?;

    Ok(row)
}

/// Most recent history for one product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stock_history(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
    limit: i64,
) -> Result<Vec<StockHistoryRow>, DbError> {
    let rows = sqlx::query_as::<_, StockHistoryRow>(
        "SELECT id, user_id, product_id, product_source, previous_quantity, new_quantity, \
                change_amount, change_reason, supplier_id, sync_config_id, created_at \
         FROM stock_history \
         WHERE user_id = $1 AND product_id = $2 \
         ORDER BY created_at DESC, id \
         LIMIT $3",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
