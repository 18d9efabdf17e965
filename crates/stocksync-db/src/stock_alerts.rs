//! Database operations for `stock_alerts`.
//!
//! The partial unique index `stock_alerts_one_active_idx` guarantees at most
//! one active alert per `(user_id, product_id, alert_type)`. Inserts go
//! through `ON CONFLICT ... DO NOTHING`, so two concurrent runs racing on the
//! same product produce exactly one row.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use stocksync_core::{AlertType, NewStockAlert, StockAlert};
use uuid::Uuid;

use crate::{parse_column, DbError};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockAlertRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub product_source: String,
    pub product_name: Option<String>,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub current_stock: i32,
    pub threshold: i32,
    pub status: String,
    pub supplier_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<StockAlertRow> for StockAlert {
    type Error = DbError;

    fn try_from(row: StockAlertRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            product_source: row.product_source,
            product_name: row.product_name,
            alert_type: parse_column("alert_type", &row.alert_type)?,
            severity: parse_column("severity", &row.severity)?,
            message: row.message,
            current_stock: row.current_stock,
            threshold: row.threshold,
            status: parse_column("status", &row.status)?,
            supplier_id: row.supplier_id,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

const ALERT_COLUMNS: &str = "id, user_id, product_id, product_source, product_name, alert_type, \
     severity, message, current_stock, threshold, status, supplier_id, created_at, resolved_at";

/// Returns the active alert of `alert_type` for the product, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_active_alert(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
    alert_type: AlertType,
) -> Result<Option<StockAlertRow>, DbError> {
    let sql = format!(
        "SELECT {ALERT_COLUMNS} FROM stock_alerts \
         WHERE user_id = $1 AND product_id = $2 AND alert_type = $3 AND status = 'active'"
    );
    let row = sqlx::query_as::<_, StockAlertRow>(&sql)
        .bind(user_id)
        .bind(product_id)
        .bind(alert_type.as_str())
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Inserts an active alert unless one of the same type is already active for
/// the product. Returns `None` when the insert was suppressed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for any other reason.
pub async fn insert_alert_if_absent<'e, E>(
    executor: E,
    alert: &NewStockAlert,
) -> Result<Option<StockAlertRow>, DbError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO stock_alerts \
             (id, user_id, product_id, product_source, product_name, alert_type, severity, \
              message, current_stock, threshold, status, supplier_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'active', $11) \
         ON CONFLICT (user_id, product_id, alert_type) WHERE status = 'active' DO NOTHING \
         RETURNING {ALERT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, StockAlertRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(alert.user_id)
        .bind(alert.product_id)
        .bind(&alert.product_source)
        .bind(alert.product_name.as_deref())
        .bind(alert.alert_type.as_str())
        .bind(alert.severity().as_str())
        .bind(&alert.message)
        .bind(alert.current_stock)
        .bind(alert.threshold)
        .bind(alert.supplier_id)
        .fetch_optional(executor)
        .await?;

    Ok(row)
}

/// Resolves the product's active alerts of the given types. Returns the
/// number of alerts resolved.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn resolve_active_alerts<'e, E>(
    executor: E,
    user_id: Uuid,
    product_id: Uuid,
    alert_types: &[AlertType],
    resolved_at: DateTime<Utc>,
) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    let types: Vec<&str> = alert_types.iter().map(|t| t.as_str()).collect();
    let result = sqlx::query(
        "UPDATE stock_alerts SET status = 'resolved', resolved_at = $4 \
         WHERE user_id = $1 AND product_id = $2 AND alert_type = ANY($3) AND status = 'active'",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(&types)
    .bind(resolved_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Lists the user's active alerts, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_alerts(pool: &PgPool, user_id: Uuid) -> Result<Vec<StockAlertRow>, DbError> {
    let sql = format!(
        "SELECT {ALERT_COLUMNS} FROM stock_alerts \
         WHERE user_id = $1 AND status = 'active' \
         ORDER BY created_at DESC, id"
    );
    let rows = sqlx::query_as::<_, StockAlertRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
