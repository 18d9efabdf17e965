use uuid::Uuid;

/// Credential material for one (user, supplier) pair. Which fields a
/// connector reads is up to the connector.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SupplierCredentials {
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub username: Option<String>,
    /// Replaces the supplier's own connector type when resolving an adapter.
    pub connector_override: Option<String>,
}

impl std::fmt::Debug for SupplierCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[redacted]");
        f.debug_struct("SupplierCredentials")
            .field("api_key", &redact(&self.api_key))
            .field("access_token", &redact(&self.access_token))
            .field("username", &self.username)
            .field("connector_override", &self.connector_override)
            .finish()
    }
}

/// A supplier resolved for one run: its id, display name, the connector key
/// used to pick an adapter, and the caller's credentials (if any).
#[derive(Debug, Clone)]
pub struct SupplierDescriptor {
    pub supplier_id: Uuid,
    pub name: String,
    pub connector: String,
    pub credentials: Option<SupplierCredentials>,
}

impl SupplierDescriptor {
    /// Builds a descriptor, picking the connector key from the credential
    /// override first, then the supplier's connector type. The key is
    /// lower-cased; an empty result means no adapter can match.
    #[must_use]
    pub fn resolve(
        supplier_id: Uuid,
        name: impl Into<String>,
        connector_type: Option<&str>,
        credentials: Option<SupplierCredentials>,
    ) -> Self {
        let connector = credentials
            .as_ref()
            .and_then(|c| c.connector_override.as_deref())
            .filter(|s| !s.trim().is_empty())
            .or(connector_type)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        Self {
            supplier_id,
            name: name.into(),
            connector,
            credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_connector_type() {
        let creds = SupplierCredentials {
            connector_override: Some("VidaXL".to_string()),
            ..SupplierCredentials::default()
        };
        let d = SupplierDescriptor::resolve(Uuid::nil(), "Acme", Some("bigbuy"), Some(creds));
        assert_eq!(d.connector, "vidaxl");
    }

    #[test]
    fn blank_override_falls_back_to_connector_type() {
        let creds = SupplierCredentials {
            connector_override: Some("  ".to_string()),
            ..SupplierCredentials::default()
        };
        let d = SupplierDescriptor::resolve(Uuid::nil(), "Acme", Some("BigBuy"), Some(creds));
        assert_eq!(d.connector, "bigbuy");
    }

    #[test]
    fn missing_everything_yields_empty_connector() {
        let d = SupplierDescriptor::resolve(Uuid::nil(), "Acme", None, None);
        assert!(d.connector.is_empty());
    }

    #[test]
    fn debug_redacts_secrets() {
        let creds = SupplierCredentials {
            api_key: Some("key-123".to_string()),
            access_token: Some("tok-456".to_string()),
            ..SupplierCredentials::default()
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("key-123"));
        assert!(!rendered.contains("tok-456"));
    }
}
