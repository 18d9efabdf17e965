use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::{
    BigBuyAdapter, BtsWholesalerAdapter, CjDropshippingAdapter, HttpSettings, MatterhornAdapter,
    VidaXlAdapter,
};
use crate::{FetchError, SupplierAdapter, SupplierDescriptor};

/// Maps lower-case connector keys to adapters. Built once at startup and
/// shared behind an `Arc`.
#[derive(Default, Clone)]
pub struct SupplierRegistry {
    adapters: HashMap<String, Arc<dyn SupplierAdapter>>,
}

impl std::fmt::Debug for SupplierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.adapters.keys().collect();
        keys.sort();
        f.debug_struct("SupplierRegistry")
            .field("connectors", &keys)
            .finish()
    }
}

impl SupplierRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the five built-in HTTP adapters.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if an HTTP client cannot be built.
    pub fn with_defaults(settings: &HttpSettings) -> Result<Self, FetchError> {
        let mut registry = Self::new();
        registry.register(Arc::new(BigBuyAdapter::new(settings)?));
        registry.register(Arc::new(CjDropshippingAdapter::new(settings)?));
        registry.register(Arc::new(BtsWholesalerAdapter::new(settings)?));
        registry.register(Arc::new(MatterhornAdapter::new(settings)?));
        registry.register(Arc::new(VidaXlAdapter::new(settings)?));
        Ok(registry)
    }

    /// Registers `adapter` under its connector key, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn SupplierAdapter>) {
        self.adapters
            .insert(adapter.connector().to_ascii_lowercase(), adapter);
    }

    #[must_use]
    pub fn get(&self, connector: &str) -> Option<Arc<dyn SupplierAdapter>> {
        self.adapters
            .get(&connector.trim().to_ascii_lowercase())
            .cloned()
    }

    #[must_use]
    pub fn connectors(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Dispatches to the adapter registered for `supplier.connector`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::UnknownSupplier`] when no adapter matches, or
    /// whatever the adapter returns.
    pub async fn fetch_stock(
        &self,
        supplier: &SupplierDescriptor,
        external_id: &str,
    ) -> Result<u32, FetchError> {
        let adapter = self
            .get(&supplier.connector)
            .ok_or_else(|| FetchError::UnknownSupplier(supplier.connector.clone()))?;
        adapter.fetch_stock(supplier, external_id).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;

    struct Fixed(&'static str, u32);

    #[async_trait]
    impl SupplierAdapter for Fixed {
        fn connector(&self) -> &'static str {
            self.0
        }

        async fn fetch_stock(
            &self,
            _supplier: &SupplierDescriptor,
            _external_id: &str,
        ) -> Result<u32, FetchError> {
            Ok(self.1)
        }
    }

    fn descriptor(connector: &str) -> SupplierDescriptor {
        SupplierDescriptor::resolve(Uuid::nil(), "Acme", Some(connector), None)
    }

    #[test]
    fn defaults_register_all_five_connectors() {
        let registry = SupplierRegistry::with_defaults(&HttpSettings::default()).unwrap();
        assert_eq!(
            registry.connectors(),
            vec!["bigbuy", "btswholesaler", "cjdropshipping", "matterhorn", "vidaxl"]
        );
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let mut registry = SupplierRegistry::new();
        registry.register(Arc::new(Fixed("acme", 12)));
        let qty = registry.fetch_stock(&descriptor("ACME"), "p-1").await.unwrap();
        assert_eq!(qty, 12);
    }

    #[tokio::test]
    async fn unregistered_connector_is_unknown_supplier() {
        let registry = SupplierRegistry::new();
        let err = registry
            .fetch_stock(&descriptor("nowhere"), "p-1")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnknownSupplier(ref c) if c == "nowhere"));
    }
}
