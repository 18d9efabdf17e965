use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Stored credentials for one (user, supplier) pair. Every field is optional;
/// which ones a connector needs is decided by the connector.
#[derive(Clone, sqlx::FromRow)]
pub struct SupplierCredentialsRow {
    pub user_id: Uuid,
    pub supplier_id: Uuid,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub username: Option<String>,
    pub connector_override: Option<String>,
}

impl std::fmt::Debug for SupplierCredentialsRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[redacted]");
        f.debug_struct("SupplierCredentialsRow")
            .field("user_id", &self.user_id)
            .field("supplier_id", &self.supplier_id)
            .field("api_key", &redact(&self.api_key))
            .field("access_token", &redact(&self.access_token))
            .field("username", &self.username)
            .field("connector_override", &self.connector_override)
            .finish()
    }
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_supplier_credentials(
    pool: &PgPool,
    user_id: Uuid,
    supplier_id: Uuid,
) -> Result<Option<SupplierCredentialsRow>, DbError> {
    let row = sqlx::query_as::<_, SupplierCredentialsRow>(
        "SELECT user_id, supplier_id, api_key, access_token, username, connector_override \
         FROM supplier_credentials \
         WHERE user_id = $1 AND supplier_id = $2",
    )
    .bind(user_id)
    .bind(supplier_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secrets() {
        let row = SupplierCredentialsRow {
            user_id: Uuid::nil(),
            supplier_id: Uuid::nil(),
            api_key: Some("sk-live-123".to_string()),
            access_token: Some("tok-456".to_string()),
            username: Some("acme".to_string()),
            connector_override: None,
        };
        let rendered = format!("{row:?}");
        assert!(!rendered.contains("sk-live-123"));
        assert!(!rendered.contains("tok-456"));
        assert!(rendered.contains("acme"));
    }
}
