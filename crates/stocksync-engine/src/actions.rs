//! Request Router: the JSON action envelope shared by the HTTP server and
//! the CLI.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stocksync_core::{OutOfStockAction, SupplierSyncConfig};
use stocksync_db::SyncConfigUpdate;
use thiserror::Error;
use uuid::Uuid;

use crate::alerts::{check_alerts, AlertSweep};
use crate::error::EngineError;
use crate::orchestrator::{SyncOrchestrator, SyncRunResult};
use crate::short_id;

pub const MIN_SYNC_FREQUENCY_MINUTES: i32 = 5;
pub const MAX_SYNC_FREQUENCY_MINUTES: i32 = 1440;
pub const MAX_LOW_STOCK_THRESHOLD: i32 = 1000;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("user id must not be supplied in the request body")]
    UserIdInBody,

    #[error("{0}")]
    NotFound(String),

    #[error("no valid updates provided")]
    NoUpdates,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ActionError {
    /// HTTP status the error maps to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAction(_)
            | Self::InvalidRequest(_)
            | Self::UserIdInBody
            | Self::NoUpdates => 400,
            Self::NotFound(_) | Self::Engine(EngineError::ConfigNotFound(_)) => 404,
            Self::Engine(_) => 500,
        }
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self.status_code() {
            400 => "validation_error",
            404 => "not_found",
            _ => "internal_error",
        }
    }

    /// Message safe to return to callers. Store failures stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Engine(EngineError::ConfigNotFound(_)) => "sync config not found".to_string(),
            Self::Engine(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SyncAll,
    SyncSupplier,
    UpdateConfig,
    CheckAlerts,
    GetStatus,
}

impl FromStr for Action {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync_all" => Ok(Self::SyncAll),
            "sync_supplier" => Ok(Self::SyncSupplier),
            "update_config" => Ok(Self::UpdateConfig),
            "check_alerts" => Ok(Self::CheckAlerts),
            "get_status" => Ok(Self::GetStatus),
            other => Err(ActionError::InvalidAction(other.to_string())),
        }
    }
}

/// The action envelope. Fields irrelevant to the chosen action are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    pub supplier_id: Option<String>,
    pub config_id: Option<String>,
    pub sync_enabled: Option<bool>,
    /// Any JSON number; fractions are truncated before clamping.
    pub sync_frequency_minutes: Option<f64>,
    pub low_stock_threshold: Option<f64>,
    pub out_of_stock_action: Option<String>,
}

impl ActionRequest {
    /// Parses a raw JSON body. The caller's identity never comes from the
    /// body, so `userId`/`user_id` keys are rejected outright.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::UserIdInBody`] or
    /// [`ActionError::InvalidRequest`].
    pub fn from_value(body: Value) -> Result<Self, ActionError> {
        let Value::Object(map) = &body else {
            return Err(ActionError::InvalidRequest(
                "request body must be a JSON object".to_string(),
            ));
        };
        if map.contains_key("userId") || map.contains_key("user_id") {
            return Err(ActionError::UserIdInBody);
        }
        serde_json::from_value(body).map_err(|e| ActionError::InvalidRequest(e.to_string()))
    }

    #[must_use]
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncAllResponse {
    pub success: bool,
    pub synced_suppliers: usize,
    pub results: Vec<SyncRunResult>,
}

#[derive(Debug, Serialize)]
pub struct SyncSupplierResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: SyncRunResult,
}

#[derive(Debug, Serialize)]
pub struct UpdateConfigResponse {
    pub success: bool,
    pub config: SupplierSyncConfig,
}

#[derive(Debug, Serialize)]
pub struct CheckAlertsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub sweep: AlertSweep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigStatus {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub supplier_name: Option<String>,
    pub sync_enabled: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub next_sync_at: DateTime<Utc>,
    pub total_syncs: i64,
    pub failed_syncs: i64,
    pub last_error: Option<String>,
}

impl From<SupplierSyncConfig> for ConfigStatus {
    fn from(c: SupplierSyncConfig) -> Self {
        Self {
            id: c.id,
            supplier_id: c.supplier_id,
            supplier_name: c.supplier_name,
            sync_enabled: c.sync_enabled,
            last_sync_at: c.last_sync_at,
            next_sync_at: c.next_sync_at,
            total_syncs: c.total_syncs,
            failed_syncs: c.failed_syncs,
            last_error: c.last_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub configs: Vec<ConfigStatus>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ActionResponse {
    SyncAll(SyncAllResponse),
    SyncSupplier(SyncSupplierResponse),
    UpdateConfig(UpdateConfigResponse),
    CheckAlerts(CheckAlertsResponse),
    Status(StatusResponse),
}

/// Dispatches one action for the authenticated `user_id`.
///
/// # Errors
///
/// Returns [`ActionError`] for unknown actions, invalid fields, missing
/// configs, and store failures. Per-product and per-supplier sync failures
/// are reported inside the response instead.
pub async fn dispatch(
    orchestrator: &SyncOrchestrator,
    user_id: Uuid,
    request: &ActionRequest,
    now: DateTime<Utc>,
) -> Result<ActionResponse, ActionError> {
    let action: Action = request.action.parse()?;
    tracing::debug!(
        action = %request.action,
        user = %short_id(user_id),
        "dispatching action"
    );

    match action {
        Action::SyncAll => {
            let results = orchestrator.sync_all(user_id, now).await?;
            Ok(ActionResponse::SyncAll(SyncAllResponse {
                success: true,
                synced_suppliers: results.len(),
                results,
            }))
        }
        Action::SyncSupplier => {
            let supplier_id = require_uuid(request.supplier_id.as_deref(), "supplier_id")?;
            let config = orchestrator
                .store()
                .get_config_by_supplier(user_id, supplier_id)
                .await?
                .ok_or_else(|| {
                    ActionError::NotFound(format!("no sync config for supplier {supplier_id}"))
                })?;
            let result = orchestrator.run_sync(&config, now).await?;
            Ok(ActionResponse::SyncSupplier(SyncSupplierResponse {
                success: true,
                result,
            }))
        }
        Action::UpdateConfig => {
            let config_id = require_uuid(request.config_id.as_deref(), "config_id")?;
            let update = build_update(request, now)?;
            if update.is_empty() {
                return Err(ActionError::NoUpdates);
            }
            let config = orchestrator
                .store()
                .update_config(user_id, config_id, &update)
                .await?
                .ok_or_else(|| {
                    ActionError::NotFound(format!("sync config {config_id} not found"))
                })?;
            tracing::info!(config_id = %config_id, ?update, "sync config updated");
            Ok(ActionResponse::UpdateConfig(UpdateConfigResponse {
                success: true,
                config,
            }))
        }
        Action::CheckAlerts => {
            let sweep = check_alerts(orchestrator.store().as_ref(), user_id).await?;
            Ok(ActionResponse::CheckAlerts(CheckAlertsResponse {
                success: true,
                sweep,
            }))
        }
        Action::GetStatus => {
            let configs = orchestrator.store().list_configs(user_id).await?;
            Ok(ActionResponse::Status(StatusResponse {
                success: true,
                configs: configs.into_iter().map(ConfigStatus::from).collect(),
            }))
        }
    }
}

/// Translates the envelope's optional fields into a config update.
///
/// Frequency and threshold are truncated and clamped rather than rejected. A
/// frequency change reschedules the next run from `now`.
///
/// # Errors
///
/// Returns [`ActionError::InvalidRequest`] for an unknown
/// `out_of_stock_action` or a non-finite number.
pub fn build_update(
    request: &ActionRequest,
    now: DateTime<Utc>,
) -> Result<SyncConfigUpdate, ActionError> {
    let mut update = SyncConfigUpdate {
        sync_enabled: request.sync_enabled,
        ..SyncConfigUpdate::default()
    };

    if let Some(minutes) = request.sync_frequency_minutes {
        let minutes = clamp_whole(
            minutes,
            MIN_SYNC_FREQUENCY_MINUTES,
            MAX_SYNC_FREQUENCY_MINUTES,
            "sync_frequency_minutes",
        )?;
        update.sync_frequency_minutes = Some(minutes);
        update.next_sync_at = Some(now + Duration::minutes(i64::from(minutes)));
    }
    if let Some(threshold) = request.low_stock_threshold {
        update.low_stock_threshold = Some(clamp_whole(
            threshold,
            0,
            MAX_LOW_STOCK_THRESHOLD,
            "low_stock_threshold",
        )?);
    }
    if let Some(action) = request.out_of_stock_action.as_deref() {
        let action = action
            .parse::<OutOfStockAction>()
            .map_err(|e| ActionError::InvalidRequest(e.to_string()))?;
        update.out_of_stock_action = Some(action);
    }
    Ok(update)
}

#[allow(clippy::cast_possible_truncation)]
fn clamp_whole(value: f64, min: i32, max: i32, field: &str) -> Result<i32, ActionError> {
    if !value.is_finite() {
        return Err(ActionError::InvalidRequest(format!(
            "{field} must be a finite number"
        )));
    }
    // In range after the clamp, so the cast is exact.
    Ok(value.trunc().clamp(f64::from(min), f64::from(max)) as i32)
}

fn require_uuid(value: Option<&str>, field: &str) -> Result<Uuid, ActionError> {
    let raw = value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ActionError::InvalidRequest(format!("{field} is required")))?;
    Uuid::parse_str(raw)
        .map_err(|_| ActionError::InvalidRequest(format!("{field} must be a UUID")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn user_id_in_body_is_rejected() {
        for key in ["userId", "user_id"] {
            let body = json!({ "action": "sync_all", key: "abc" });
            assert!(matches!(
                ActionRequest::from_value(body),
                Err(ActionError::UserIdInBody)
            ));
        }
    }

    #[test]
    fn non_object_body_is_invalid() {
        let err = ActionRequest::from_value(json!(["sync_all"])).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn unknown_action_is_a_bad_request() {
        let err = "sync_everything".parse::<Action>().unwrap_err();
        assert!(matches!(err, ActionError::InvalidAction(ref a) if a == "sync_everything"));
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn frequency_and_threshold_are_clamped() {
        let now = Utc::now();
        let mut req = ActionRequest::new("update_config");
        req.sync_frequency_minutes = Some(1.0);
        req.low_stock_threshold = Some(-4.0);
        let update = build_update(&req, now).unwrap();
        assert_eq!(update.sync_frequency_minutes, Some(5));
        assert_eq!(update.next_sync_at, Some(now + Duration::minutes(5)));
        assert_eq!(update.low_stock_threshold, Some(0));

        req.sync_frequency_minutes = Some(1e12);
        req.low_stock_threshold = Some(5_000.0);
        let update = build_update(&req, now).unwrap();
        assert_eq!(update.sync_frequency_minutes, Some(1440));
        assert_eq!(update.low_stock_threshold, Some(1000));
    }

    #[test]
    fn fractional_numbers_are_accepted_and_truncated() {
        let now = Utc::now();
        let body = json!({
            "action": "update_config",
            "config_id": Uuid::new_v4().to_string(),
            "sync_frequency_minutes": 30.0,
            "low_stock_threshold": 12.7,
        });
        let req = ActionRequest::from_value(body).unwrap();
        let update = build_update(&req, now).unwrap();
        assert_eq!(update.sync_frequency_minutes, Some(30));
        assert_eq!(update.next_sync_at, Some(now + Duration::minutes(30)));
        assert_eq!(update.low_stock_threshold, Some(12));

        let body = json!({ "action": "update_config", "sync_frequency_minutes": 4.9 });
        let req = ActionRequest::from_value(body).unwrap();
        assert_eq!(build_update(&req, now).unwrap().sync_frequency_minutes, Some(5));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let mut req = ActionRequest::new("update_config");
        req.low_stock_threshold = Some(f64::NAN);
        assert!(matches!(
            build_update(&req, Utc::now()),
            Err(ActionError::InvalidRequest(ref m)) if m.contains("low_stock_threshold")
        ));
    }

    #[test]
    fn threshold_change_alone_keeps_schedule() {
        let mut req = ActionRequest::new("update_config");
        req.low_stock_threshold = Some(3.0);
        let update = build_update(&req, Utc::now()).unwrap();
        assert_eq!(update.next_sync_at, None);
        assert!(!update.is_empty());
    }

    #[test]
    fn invalid_out_of_stock_action_is_rejected() {
        let mut req = ActionRequest::new("update_config");
        req.out_of_stock_action = Some("delete".to_string());
        assert!(matches!(
            build_update(&req, Utc::now()),
            Err(ActionError::InvalidRequest(_))
        ));
    }

    #[test]
    fn empty_update_is_detected() {
        let req = ActionRequest::new("update_config");
        assert!(build_update(&req, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn uuid_fields_are_validated() {
        assert!(require_uuid(None, "config_id").is_err());
        assert!(require_uuid(Some("  "), "config_id").is_err());
        assert!(require_uuid(Some("not-a-uuid"), "config_id").is_err());
        let id = Uuid::new_v4();
        assert_eq!(require_uuid(Some(&id.to_string()), "config_id").unwrap(), id);
    }

    #[test]
    fn store_failures_hide_details() {
        let err = ActionError::Engine(EngineError::Store("lock poisoned".to_string()));
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "internal error");
    }
}
