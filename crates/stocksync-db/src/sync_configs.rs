//! Database operations for `stock_sync_configs`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use stocksync_core::{OutOfStockAction, SupplierSyncConfig};
use uuid::Uuid;

use crate::{parse_column, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from `stock_sync_configs`, joined with the owning supplier's name
/// and connector type.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncConfigRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub supplier_id: Uuid,
    pub supplier_name: Option<String>,
    pub connector_type: Option<String>,
    pub sync_enabled: bool,
    pub sync_frequency_minutes: i32,
    pub low_stock_threshold: i32,
    /// One of `hide`, `flag`, `ignore` (enforced by a CHECK constraint).
    pub out_of_stock_action: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub next_sync_at: DateTime<Utc>,
    pub total_syncs: i64,
    pub failed_syncs: i64,
    pub last_error: Option<String>,
}

impl TryFrom<SyncConfigRow> for SupplierSyncConfig {
    type Error = DbError;

    fn try_from(row: SyncConfigRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            supplier_id: row.supplier_id,
            supplier_name: row.supplier_name,
            connector_type: row.connector_type,
            sync_enabled: row.sync_enabled,
            sync_frequency_minutes: row.sync_frequency_minutes,
            low_stock_threshold: row.low_stock_threshold,
            out_of_stock_action: parse_column("out_of_stock_action", &row.out_of_stock_action)?,
            last_sync_at: row.last_sync_at,
            next_sync_at: row.next_sync_at,
            total_syncs: row.total_syncs,
            failed_syncs: row.failed_syncs,
            last_error: row.last_error,
        })
    }
}

/// Insert payload for a new per-(user, supplier) config.
#[derive(Debug, Clone)]
pub struct NewSyncConfig {
    pub user_id: Uuid,
    pub supplier_id: Uuid,
    pub sync_frequency_minutes: i32,
    pub low_stock_threshold: i32,
    pub out_of_stock_action: OutOfStockAction,
}

/// Partial update applied by `update_config`. `None` leaves a column as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConfigUpdate {
    pub sync_enabled: Option<bool>,
    pub sync_frequency_minutes: Option<i32>,
    pub low_stock_threshold: Option<i32>,
    pub out_of_stock_action: Option<OutOfStockAction>,
    pub next_sync_at: Option<DateTime<Utc>>,
}

impl SyncConfigUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Bookkeeping written after every orchestrator run, successful or not.
#[derive(Debug, Clone)]
pub struct SyncRunRecord {
    pub ran_at: DateTime<Utc>,
    pub next_sync_at: DateTime<Utc>,
    pub failed: bool,
    pub last_error: Option<String>,
}

const SELECT_CONFIG: &str = "SELECT c.id, c.user_id, c.supplier_id, \
            s.name AS supplier_name, s.connector_type, \
            c.sync_enabled, c.sync_frequency_minutes, c.low_stock_threshold, \
            c.out_of_stock_action, c.last_sync_at, c.next_sync_at, \
            c.total_syncs, c.failed_syncs, c.last_error \
     FROM stock_sync_configs c \
     JOIN suppliers s ON s.id = c.supplier_id";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns the user's enabled configs whose `next_sync_at` is at or before `now`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_due_sync_configs(
    pool: &PgPool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<SyncConfigRow>, DbError> {
    let sql = format!(
        "{SELECT_CONFIG} \
         WHERE c.user_id = $1 AND c.sync_enabled = true AND c.next_sync_at <= $2 \
         ORDER BY c.next_sync_at, c.id"
    );
    let rows = sqlx::query_as::<_, SyncConfigRow>(&sql)
        .bind(user_id)
        .bind(now)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns every config owned by `user_id`, enabled or not.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_configs(pool: &PgPool, user_id: Uuid) -> Result<Vec<SyncConfigRow>, DbError> {
    let sql = format!("{SELECT_CONFIG} WHERE c.user_id = $1 ORDER BY c.created_at, c.id");
    let rows = sqlx::query_as::<_, SyncConfigRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Fetches one config by id, scoped to its owner.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_config(
    pool: &PgPool,
    user_id: Uuid,
    config_id: Uuid,
) -> Result<Option<SyncConfigRow>, DbError> {
    let sql = format!("{SELECT_CONFIG} WHERE c.user_id = $1 AND c.id = $2");
    let row = sqlx::query_as::<_, SyncConfigRow>(&sql)
        .bind(user_id)
        .bind(config_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Fetches the user's config for one supplier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_config_by_supplier(
    pool: &PgPool,
    user_id: Uuid,
    supplier_id: Uuid,
) -> Result<Option<SyncConfigRow>, DbError> {
    let sql = format!("{SELECT_CONFIG} WHERE c.user_id = $1 AND c.supplier_id = $2");
    let row = sqlx::query_as::<_, SyncConfigRow>(&sql)
        .bind(user_id)
        .bind(supplier_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Returns the distinct owners of at least one due config.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_due_user_ids(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Uuid>, DbError> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT DISTINCT user_id FROM stock_sync_configs \
         WHERE sync_enabled = true AND next_sync_at <= $1 \
         ORDER BY user_id",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Creates a config that is due immediately.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including the
/// `(user_id, supplier_id)` uniqueness constraint).
pub async fn create_sync_config(pool: &PgPool, new: &NewSyncConfig) -> Result<SyncConfigRow, DbError> {
    let sql = format!(
        "WITH inserted AS ( \
             INSERT INTO stock_sync_configs \
                 (id, user_id, supplier_id, sync_frequency_minutes, low_stock_threshold, \
                  out_of_stock_action, next_sync_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             RETURNING * \
         ) \
         {}",
        SELECT_CONFIG.replace("FROM stock_sync_configs c", "FROM inserted c")
    );
    let row = sqlx::query_as::<_, SyncConfigRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.supplier_id)
        .bind(new.sync_frequency_minutes)
        .bind(new.low_stock_threshold)
        .bind(new.out_of_stock_action.as_str())
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Applies a partial update to one of the user's configs and returns the
/// updated row, or `None` when the config does not exist for that user.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_sync_config(
    pool: &PgPool,
    user_id: Uuid,
    config_id: Uuid,
    update: &SyncConfigUpdate,
) -> Result<Option<SyncConfigRow>, DbError> {
    let sql = format!(
        "WITH updated AS ( \
             UPDATE stock_sync_configs SET \
                 sync_enabled           = COALESCE($3, sync_enabled), \
                 sync_frequency_minutes = COALESCE($4, sync_frequency_minutes), \
                 low_stock_threshold    = COALESCE($5, low_stock_threshold), \
                 out_of_stock_action    = COALESCE($6, out_of_stock_action), \
                 next_sync_at           = COALESCE($7, next_sync_at), \
                 updated_at             = NOW() \
             WHERE user_id = $1 AND id = $2 \
             RETURNING * \
         ) \
         {}",
        SELECT_CONFIG.replace("FROM stock_sync_configs c", "FROM updated c")
    );
    let row = sqlx::query_as::<_, SyncConfigRow>(&sql)
        .bind(user_id)
        .bind(config_id)
        .bind(update.sync_enabled)
        .bind(update.sync_frequency_minutes)
        .bind(update.low_stock_threshold)
        .bind(update.out_of_stock_action.map(OutOfStockAction::as_str))
        .bind(update.next_sync_at)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Records the outcome of one run: bumps `total_syncs` (and `failed_syncs`
/// when `record.failed`), stamps `last_sync_at`, advances `next_sync_at`, and
/// replaces `last_error`. Counters are incremented in SQL so concurrent runs
/// never lose counts.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no config matches, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn record_sync_run(
    pool: &PgPool,
    user_id: Uuid,
    config_id: Uuid,
    record: &SyncRunRecord,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE stock_sync_configs SET \
             last_sync_at = $3, \
             next_sync_at = $4, \
             total_syncs  = total_syncs + 1, \
             failed_syncs = failed_syncs + CASE WHEN $5 THEN 1 ELSE 0 END, \
             last_error   = $6, \
             updated_at   = NOW() \
         WHERE user_id = $1 AND id = $2",
    )
    .bind(user_id)
    .bind(config_id)
    .bind(record.ran_at)
    .bind(record.next_sync_at)
    .bind(record.failed)
    .bind(record.last_error.as_deref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
