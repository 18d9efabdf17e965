use async_trait::async_trait;
use serde_json::{json, Value};

use super::{require_external_id, require_secret, HttpEndpoint, HttpSettings};
use crate::{FetchError, SupplierAdapter, SupplierDescriptor};

const DEFAULT_BASE_URL: &str = "https://developers.cjdropshipping.com";

/// Units reported for a product that has at least one variant. The product
/// query exposes availability, not a count.
pub const CJ_AVAILABLE_QUANTITY: u32 = 999;

/// `POST /api2.0/v1/product/query` authenticated with `CJ-Access-Token`.
pub struct CjDropshippingAdapter {
    endpoint: HttpEndpoint,
}

impl CjDropshippingAdapter {
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_BASE_URL, settings)
    }

    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built, or
    /// [`FetchError::MalformedResponse`] if `base_url` does not parse.
    pub fn with_base_url(base_url: &str, settings: &HttpSettings) -> Result<Self, FetchError> {
        Ok(Self {
            endpoint: HttpEndpoint::new(base_url, settings)?,
        })
    }
}

#[async_trait]
impl SupplierAdapter for CjDropshippingAdapter {
    fn connector(&self) -> &'static str {
        "cjdropshipping"
    }

    async fn fetch_stock(
        &self,
        supplier: &SupplierDescriptor,
        external_id: &str,
    ) -> Result<u32, FetchError> {
        let external_id = require_external_id(external_id)?;
        let token = require_secret(supplier, |c| c.access_token.as_ref().or(c.api_key.as_ref()))?;

        let url = self.endpoint.url("api2.0/v1/product/query")?;
        let request = self
            .endpoint
            .post(url)
            .header("CJ-Access-Token", token)
            .json(&json!({ "pid": external_id }));
        let body = self.endpoint.send_json(request, external_id).await?;

        let data = body
            .get("data")
            .filter(|d| !d.is_null())
            .ok_or_else(|| FetchError::malformed("data", "missing"))?;
        let has_variants = data
            .get("variants")
            .and_then(Value::as_array)
            .is_some_and(|v| !v.is_empty());

        Ok(if has_variants { CJ_AVAILABLE_QUANTITY } else { 0 })
    }
}
