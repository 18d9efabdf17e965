use chrono::{DateTime, Utc};
use stocksync_core::SupplierSyncConfig;
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::StockStore;

/// Configs of `user_id` that are enabled and whose `next_sync_at` has
/// passed. Pure selection; nothing is written.
///
/// # Errors
///
/// Returns [`EngineError`] if the store query fails.
pub async fn due_configs<S: StockStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<SupplierSyncConfig>, EngineError> {
    let configs = store.list_due_configs(user_id, now).await?;
    Ok(configs.into_iter().filter(|c| c.is_due(now)).collect())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use stocksync_core::OutOfStockAction;

    use super::*;
    use crate::store::InMemoryStore;

    fn config(user_id: Uuid, enabled: bool, next_sync_at: DateTime<Utc>) -> SupplierSyncConfig {
        SupplierSyncConfig {
            id: Uuid::new_v4(),
            user_id,
            supplier_id: Uuid::new_v4(),
            supplier_name: Some("BigBuy".to_string()),
            connector_type: Some("bigbuy".to_string()),
            sync_enabled: enabled,
            sync_frequency_minutes: 60,
            low_stock_threshold: 10,
            out_of_stock_action: OutOfStockAction::Flag,
            last_sync_at: None,
            next_sync_at,
            total_syncs: 0,
            failed_syncs: 0,
            last_error: None,
        }
    }

    #[tokio::test]
    async fn selects_only_enabled_and_due_configs_of_the_user() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let now = Utc::now();

        let due = config(user, true, now - Duration::minutes(1));
        let exact = config(user, true, now);
        let future = config(user, true, now + Duration::minutes(1));
        let disabled = config(user, false, now - Duration::days(2));
        let foreign = config(Uuid::new_v4(), true, now - Duration::minutes(5));
        for c in [&due, &exact, &future, &disabled, &foreign] {
            store.insert_config(c.clone()).unwrap();
        }

        let ids: Vec<Uuid> = due_configs(&store, user, now)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&due.id));
        assert!(ids.contains(&exact.id));
    }
}
