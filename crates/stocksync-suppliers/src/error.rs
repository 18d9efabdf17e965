use thiserror::Error;

/// Typed failure of one supplier stock lookup.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no credentials configured for supplier {supplier}")]
    MissingCredentials { supplier: String },

    #[error("external product id is empty")]
    EmptyExternalId,

    /// Timeouts, connection failures, HTTP 429 and 5xx. Safe to retry later.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// HTTP 401/403. Credentials are likely revoked; retrying will not help.
    #[error("supplier rejected credentials (HTTP {status})")]
    Auth { status: u16 },

    #[error("no adapter registered for connector \"{0}\"")]
    UnknownSupplier(String),

    #[error("product {external_id} not found at supplier")]
    ProductNotFound { external_id: String },

    #[error("unexpected HTTP status {status} from supplier")]
    UnexpectedStatus { status: u16 },

    #[error("malformed response for {context}: {reason}")]
    MalformedResponse { context: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Returns `true` only for [`FetchError::TransientNetwork`].
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }

    pub(crate) fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::malformed("response body", err.to_string());
        }
        if let Some(status) = err.status() {
            return status_error(status.as_u16(), "");
        }
        Self::TransientNetwork(err.to_string())
    }
}

/// Maps a non-2xx status to its error kind.
pub(crate) fn status_error(status: u16, external_id: &str) -> FetchError {
    match status {
        401 | 403 => FetchError::Auth { status },
        404 => FetchError::ProductNotFound {
            external_id: external_id.to_string(),
        },
        429 | 500..=599 => FetchError::TransientNetwork(format!("HTTP {status}")),
        _ => FetchError::UnexpectedStatus { status },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retriable() {
        assert!(FetchError::TransientNetwork("timeout".to_string()).is_retriable());
        assert!(!FetchError::Auth { status: 401 }.is_retriable());
        assert!(!FetchError::UnknownSupplier("acme".to_string()).is_retriable());
        assert!(!FetchError::malformed("stock", "missing").is_retriable());
    }

    #[test]
    fn status_mapping_covers_every_class() {
        assert!(matches!(status_error(401, "x"), FetchError::Auth { status: 401 }));
        assert!(matches!(status_error(403, "x"), FetchError::Auth { status: 403 }));
        assert!(matches!(
            status_error(404, "SKU-1"),
            FetchError::ProductNotFound { ref external_id } if external_id == "SKU-1"
        ));
        assert!(status_error(429, "x").is_retriable());
        assert!(status_error(503, "x").is_retriable());
        assert!(matches!(
            status_error(418, "x"),
            FetchError::UnexpectedStatus { status: 418 }
        ));
    }
}
