//! Sync and config command handlers.
//!
//! Every command here goes through the same action router the HTTP server
//! uses, so validation, clamping and response shapes match exactly.

use std::sync::Arc;

use chrono::Utc;
use stocksync_engine::{
    dispatch, ActionRequest, ActionResponse, PgStore, StockStore, SyncOrchestrator, SyncSettings,
};
use stocksync_suppliers::{HttpSettings, SupplierRegistry};
use uuid::Uuid;

/// Builds an orchestrator over Postgres with the five built-in adapters.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be built.
pub(crate) fn build_orchestrator(
    pool: sqlx::PgPool,
    config: &stocksync_core::AppConfig,
) -> anyhow::Result<SyncOrchestrator> {
    let registry = SupplierRegistry::with_defaults(&HttpSettings {
        timeout_secs: config.supplier_request_timeout_secs,
        user_agent: config.supplier_user_agent.clone(),
    })?;
    let store: Arc<dyn StockStore> = Arc::new(PgStore::new(pool));
    Ok(SyncOrchestrator::new(
        store,
        Arc::new(registry),
        SyncSettings::from_app_config(config),
    ))
}

pub(crate) fn sync_all_request() -> ActionRequest {
    ActionRequest::new("sync_all")
}

pub(crate) fn sync_supplier_request(supplier_id: Uuid) -> ActionRequest {
    ActionRequest {
        supplier_id: Some(supplier_id.to_string()),
        ..ActionRequest::new("sync_supplier")
    }
}

pub(crate) fn check_alerts_request() -> ActionRequest {
    ActionRequest::new("check_alerts")
}

pub(crate) fn status_request() -> ActionRequest {
    ActionRequest::new("get_status")
}

pub(crate) fn update_config_request(
    config_id: Uuid,
    enabled: Option<bool>,
    frequency: Option<f64>,
    threshold: Option<f64>,
    out_of_stock_action: Option<String>,
) -> ActionRequest {
    ActionRequest {
        config_id: Some(config_id.to_string()),
        sync_enabled: enabled,
        sync_frequency_minutes: frequency,
        low_stock_threshold: threshold,
        out_of_stock_action,
        ..ActionRequest::new("update_config")
    }
}

/// Dispatches `request` for `user_id` and prints the response, either as
/// pretty JSON or as a short human summary.
///
/// # Errors
///
/// Returns an error if the action is rejected or the store fails.
pub(crate) async fn run_action(
    orchestrator: &SyncOrchestrator,
    user_id: Uuid,
    request: ActionRequest,
    json: bool,
) -> anyhow::Result<()> {
    let response = dispatch(orchestrator, user_id, &request, Utc::now()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    for line in summarize(&response) {
        println!("{line}");
    }
    Ok(())
}

/// Syncs every user with due configs, the same work one scheduler tick does.
///
/// # Errors
///
/// Returns an error if the due-user query fails.
pub(crate) async fn run_sweep(orchestrator: &SyncOrchestrator) -> anyhow::Result<()> {
    let summary = orchestrator.sweep_due_users(Utc::now()).await?;
    println!(
        "users: {}  runs: {}  failed runs: {}",
        summary.users, summary.runs, summary.failed_runs
    );
    Ok(())
}

fn fmt_time(time: Option<chrono::DateTime<Utc>>) -> String {
    time.map_or_else(
        || "never".to_string(),
        |t| t.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}

pub(crate) fn summarize(response: &ActionResponse) -> Vec<String> {
    match response {
        ActionResponse::SyncAll(body) => {
            let mut lines = vec![format!("synced suppliers: {}", body.synced_suppliers)];
            lines.push(format!(
                "{:<24}{:>9}{:>9}{:>8}{:>6}{:>6}  ERROR",
                "SUPPLIER", "CHECKED", "UPDATED", "FAILED", "LOW", "OUT"
            ));
            for r in &body.results {
                lines.push(format!(
                    "{:<24}{:>9}{:>9}{:>8}{:>6}{:>6}  {}",
                    r.supplier_name.as_deref().unwrap_or("unknown"),
                    r.products_checked,
                    r.products_updated,
                    r.products_failed,
                    r.low_stock_detected,
                    r.out_of_stock_detected,
                    r.error.as_deref().unwrap_or("-"),
                ));
            }
            lines
        }
        ActionResponse::SyncSupplier(body) => {
            let r = &body.result;
            let mut lines = vec![
                format!(
                    "supplier: {}",
                    r.supplier_name.as_deref().unwrap_or("unknown")
                ),
                format!(
                    "checked {}  updated {}  failed {}",
                    r.products_checked, r.products_updated, r.products_failed
                ),
                format!(
                    "low stock {}  out of stock {}  alerts created {}  alerts resolved {}",
                    r.low_stock_detected,
                    r.out_of_stock_detected,
                    r.alerts_created,
                    r.alerts_resolved
                ),
            ];
            if let Some(error) = &r.error {
                lines.push(format!("error: {error}"));
            }
            lines
        }
        ActionResponse::UpdateConfig(body) => vec![format!(
            "config {} updated: enabled={} every {} min, threshold {}, out-of-stock {}",
            body.config.id,
            body.config.sync_enabled,
            body.config.sync_frequency_minutes,
            body.config.low_stock_threshold,
            body.config.out_of_stock_action,
        )],
        ActionResponse::CheckAlerts(body) => {
            let mut lines = vec![format!("alerts created: {}", body.sweep.alerts_created)];
            for a in &body.sweep.alerts {
                lines.push(format!(
                    "{:<14}{:>6}  {:<16}{}",
                    a.alert_type.as_str(),
                    a.stock,
                    a.outcome.as_str(),
                    a.product_name
                ));
            }
            lines
        }
        ActionResponse::Status(body) => {
            if body.configs.is_empty() {
                return vec!["no sync configs".to_string()];
            }
            let mut lines = vec![format!(
                "{:<24}{:<9}{:<22}{:<22}{:>7}{:>8}",
                "SUPPLIER", "ENABLED", "LAST SYNC", "NEXT SYNC", "RUNS", "FAILED"
            )];
            for c in &body.configs {
                lines.push(format!(
                    "{:<24}{:<9}{:<22}{:<22}{:>7}{:>8}",
                    c.supplier_name.as_deref().unwrap_or("unknown"),
                    c.sync_enabled,
                    fmt_time(c.last_sync_at),
                    fmt_time(Some(c.next_sync_at)),
                    c.total_syncs,
                    c.failed_syncs,
                ));
            }
            lines
        }
    }
}
