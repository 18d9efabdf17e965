use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Identity resolved from the bearer token, stored as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

#[derive(Clone)]
struct TokenEntry {
    digest: [u8; 32],
    user_id: Uuid,
}

/// Bearer tokens mapped to user ids. Only salted SHA-256 digests are kept.
#[derive(Clone)]
pub struct AuthState {
    salt: Arc<str>,
    tokens: Arc<Vec<TokenEntry>>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("tokens", &self.tokens.len())
            .finish_non_exhaustive()
    }
}

impl AuthState {
    /// Builds auth config from `STOCKSYNC_API_TOKENS`
    /// (comma-separated `<user-uuid>=<token>` pairs).
    ///
    /// # Errors
    ///
    /// Fails when the variable is empty or any pair is malformed. Every
    /// action needs a caller identity, so there is no unauthenticated mode.
    pub fn from_env(salt: &str) -> anyhow::Result<Self> {
        let raw = std::env::var("STOCKSYNC_API_TOKENS").unwrap_or_default();
        Self::from_pairs(&raw, salt)
    }

    /// # Errors
    ///
    /// Fails on an empty list, a non-UUID user id, or a blank token.
    pub fn from_pairs(raw: &str, salt: &str) -> anyhow::Result<Self> {
        let mut tokens = Vec::new();
        for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((user, token)) = pair.split_once('=') else {
                anyhow::bail!("STOCKSYNC_API_TOKENS entries must be <user-uuid>=<token>");
            };
            let user_id = Uuid::parse_str(user.trim())
                .map_err(|e| anyhow::anyhow!("invalid user id in STOCKSYNC_API_TOKENS: {e}"))?;
            let token = token.trim();
            if token.is_empty() {
                anyhow::bail!("empty token for user {user_id} in STOCKSYNC_API_TOKENS");
            }
            tokens.push(TokenEntry {
                digest: hash_token(salt, token),
                user_id,
            });
        }

        if tokens.is_empty() {
            anyhow::bail!(
                "STOCKSYNC_API_TOKENS is required; provide comma-separated <user-uuid>=<token> pairs"
            );
        }

        Ok(Self {
            salt: Arc::from(salt),
            tokens: Arc::new(tokens),
        })
    }

    /// Compares against every entry so timing does not depend on which
    /// token matched.
    fn resolve(&self, token: &str) -> Option<Uuid> {
        let digest = hash_token(&self.salt, token);
        let mut found = None;
        for entry in self.tokens.iter() {
            if bool::from(entry.digest[..].ct_eq(&digest[..])) {
                found = Some(entry.user_id);
            }
        }
        found
    }
}

fn hash_token(salt: &str, token: &str) -> [u8; 32] {
    Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(b":")
        .chain_update(token.as_bytes())
        .finalize()
        .into()
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter shared by every protected route.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }

    #[must_use]
    pub fn from_app_config(config: &stocksync_core::AppConfig) -> Self {
        Self::new(
            config.rate_limit_max_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        )
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    success: bool,
    error: &'static str,
    code: &'static str,
}

fn reject(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    (
        status,
        Json(MiddlewareErrorBody {
            success: false,
            error: message,
            code,
        }),
    )
        .into_response()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Resolves the bearer token to a user and stores it as
/// [`AuthenticatedUser`]. Unresolvable requests never reach a handler.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let user =
        extract_bearer_token(req.headers().get(AUTHORIZATION)).and_then(|t| auth.resolve(t));

    match user {
        Some(user_id) => {
            req.extensions_mut().insert(AuthenticatedUser(user_id));
            next.run(req).await
        }
        None => reject(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        ),
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        return reject(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded",
        );
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `true` when `origin` is listed exactly, or matches a `*.domain` entry by
/// host suffix.
#[must_use]
pub fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|entry| match entry.strip_prefix("*.") {
        Some(suffix) => origin
            .split_once("://")
            .map(|(_, host)| host)
            .is_some_and(|host| {
                let host = host.split(':').next().unwrap_or(host);
                host.len() > suffix.len()
                    && host.ends_with(suffix)
                    && host[..host.len() - suffix.len()].ends_with('.')
            }),
        None => entry == origin,
    })
}
