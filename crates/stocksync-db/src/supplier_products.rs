//! Database operations for `supplier_products`.

use sqlx::{PgExecutor, PgPool};
use stocksync_core::SupplierProduct;
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SupplierProductRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub supplier_id: Uuid,
    pub external_id: String,
    pub name: String,
    pub stock_quantity: i32,
}

impl From<SupplierProductRow> for SupplierProduct {
    fn from(row: SupplierProductRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            supplier_id: row.supplier_id,
            external_id: row.external_id,
            name: row.name,
            stock_quantity: row.stock_quantity,
        }
    }
}

/// Lists the user's products sourced from `supplier_id`, in stable id order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_supplier_products(
    pool: &PgPool,
    user_id: Uuid,
    supplier_id: Uuid,
) -> Result<Vec<SupplierProductRow>, DbError> {
    let rows = sqlx::query_as::<_, SupplierProductRow>(
        "SELECT id, user_id, supplier_id, external_id, name, stock_quantity \
         FROM supplier_products \
         WHERE user_id = $1 AND supplier_id = $2 \
         ORDER BY id",
    )
    .bind(user_id)
    .bind(supplier_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Sets `stock_quantity` to `quantity` only while it still equals
/// `expected`. Returns `false` when the product is missing, foreign, or was
/// changed by a concurrent writer.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn compare_and_set_stock_quantity<'e, E>(
    executor: E,
    user_id: Uuid,
    product_id: Uuid,
    expected: i32,
    quantity: i32,
) -> Result<bool, DbError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE supplier_products SET stock_quantity = $4, updated_at = NOW() \
         WHERE user_id = $1 AND id = $2 AND stock_quantity = $3",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(expected)
    .bind(quantity)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Whether `product_id` exists and belongs to `user_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn supplier_product_exists<'e, E>(
    executor: E,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<bool, DbError>
where
    E: PgExecutor<'e>,
{
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM supplier_products WHERE user_id = $1 AND id = $2)",
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_one(executor)
    .await?;

    Ok(exists)
}
