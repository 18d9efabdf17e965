use axum::{body::Bytes, extract::State, Extension, Json};
use chrono::Utc;
use stocksync_engine::{dispatch, ActionError, ActionRequest, ActionResponse};

use super::{ApiError, AppState};
use crate::middleware::{AuthenticatedUser, RequestId};

/// `POST /api/v1/stock-sync`: the single action envelope endpoint.
pub(super) async fn handle_action(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    body: Bytes,
) -> Result<Json<ActionResponse>, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        ApiError::new(
            req_id.0.clone(),
            "validation_error",
            format!("invalid JSON body: {e}"),
        )
    })?;
    let request = ActionRequest::from_value(value).map_err(|e| map_action_error(&req_id, &e))?;

    dispatch(&state.orchestrator, user_id, &request, Utc::now())
        .await
        .map(Json)
        .map_err(|e| map_action_error(&req_id, &e))
}

fn map_action_error(req_id: &RequestId, error: &ActionError) -> ApiError {
    if error.status_code() >= 500 {
        tracing::error!(request_id = %req_id.0, error = %error, "stock-sync action failed");
    } else {
        tracing::warn!(request_id = %req_id.0, error = %error, "stock-sync action rejected");
    }
    ApiError::new(req_id.0.clone(), error.code(), error.public_message())
}
