mod stock_sync;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, request, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use sqlx::PgPool;
use stocksync_engine::SyncOrchestrator;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::{
    enforce_rate_limit, origin_allowed, request_id, require_bearer_auth, AuthState,
    RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub pool: PgPool,
}

/// Error payload: `{ "success": false, "error": ..., "code": ..., "request_id": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    pub code: String,
    pub request_id: String,
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: message.into(),
            code: code.into(),
            request_id: request_id.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    success: bool,
    status: &'static str,
    database: &'static str,
    request_id: String,
}

fn build_cors(allowed_origins: Vec<String>) -> CorsLayer {
    let allowed = Arc::new(allowed_origins);
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &request::Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| origin_allowed(origin, &allowed))
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/stock-sync", post(stock_sync::handle_action))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(
    state: AppState,
    auth: AuthState,
    rate_limit: RateLimitState,
    allowed_origins: Vec<String>,
) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors(allowed_origins))
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match stocksync_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthData {
                success: true,
                status: "ok",
                database: "ok",
                request_id: req_id.0,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthData {
                    success: false,
                    status: "degraded",
                    database: "unavailable",
                    request_id: req_id.0,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use stocksync_engine::{InMemoryStore, StockStore, SyncSettings};
    use stocksync_suppliers::SupplierRegistry;
    use tower::ServiceExt;

    use super::*;

    const USER: &str = "3d6f0a52-1c7e-4b8f-9a0d-5e2b7c4f1a90";

    fn app_with_limit(max_requests: usize) -> Router {
        let store: Arc<dyn StockStore> = Arc::new(InMemoryStore::new());
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store,
            Arc::new(SupplierRegistry::new()),
            SyncSettings::default(),
        ));
        // Never connects unless the health route is hit.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://stocksync@127.0.0.1:1/stocksync")
            .expect("lazy pool");
        let auth = AuthState::from_pairs(&format!("{USER}=test-token"), "salt").expect("auth");
        build_app(
            AppState { orchestrator, pool },
            auth,
            RateLimitState::new(max_requests, Duration::from_secs(60)),
            vec!["https://admin.example.com".to_string()],
        )
    }

    fn action(body: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/stock-sync")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let response = app_with_limit(10)
            .oneshot(action(r#"{"action":"get_status"}"#, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "unauthorized");
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let response = app_with_limit(10)
            .oneshot(action(r#"{"action":"get_status"}"#, Some("wrong")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn get_status_returns_success_envelope_and_request_id() {
        let response = app_with_limit(10)
            .oneshot(action(r#"{"action":"get_status"}"#, Some("test-token")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["configs"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn user_id_in_body_is_bad_request() {
        let body = format!(r#"{{"action":"sync_all","user_id":"{USER}"}}"#);
        let response = app_with_limit(10)
            .oneshot(action(&body, Some("test-token")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_action_and_bad_json_are_bad_requests() {
        let app = app_with_limit(10);
        let response = app
            .clone()
            .oneshot(action(r#"{"action":"reboot"}"#, Some("test-token")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "invalid action: reboot");

        let response = app
            .oneshot(action("{not json", Some("test-token")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sync_supplier_for_unknown_config_is_not_found() {
        let body = format!(
            r#"{{"action":"sync_supplier","supplier_id":"{}"}}"#,
            uuid::Uuid::new_v4()
        );
        let response = app_with_limit(10)
            .oneshot(action(&body, Some("test-token")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rate_limit_rejects_after_window_is_full() {
        let app = app_with_limit(1);
        let first = app
            .clone()
            .oneshot(action(r#"{"action":"get_status"}"#, Some("test-token")))
            .await
            .expect("response");
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(action(r#"{"action":"get_status"}"#, Some("test-token")))
            .await
            .expect("response");
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn cors_allows_only_listed_origins() {
        let preflight = |origin: &'static str| {
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/v1/stock-sync")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .expect("request")
        };

        let app = app_with_limit(10);
        let allowed = app
            .clone()
            .oneshot(preflight("https://admin.example.com"))
            .await
            .expect("response");
        assert_eq!(
            allowed
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("https://admin.example.com")
        );

        let denied = app
            .oneshot(preflight("https://evil.example.net"))
            .await
            .expect("response");
        assert!(denied
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn health_reports_degraded_without_database() {
        let response = app_with_limit(10)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(response).await;
        assert_eq!(json["database"], "unavailable");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_reports_ok_with_database(pool: PgPool) {
        let store: Arc<dyn StockStore> = Arc::new(stocksync_engine::PgStore::new(pool.clone()));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store,
            Arc::new(SupplierRegistry::new()),
            SyncSettings::default(),
        ));
        let auth = AuthState::from_pairs(&format!("{USER}=test-token"), "salt").expect("auth");
        let app = build_app(
            AppState { orchestrator, pool },
            auth,
            RateLimitState::new(10, Duration::from_secs(60)),
            Vec::new(),
        );
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
