use async_trait::async_trait;

use super::{
    encode_segment, parse_quantity, require_external_id, require_secret, HttpEndpoint,
    HttpSettings,
};
use crate::{FetchError, SupplierAdapter, SupplierDescriptor};

const DEFAULT_BASE_URL: &str = "https://b2b.vidaxl.com/api_customer";

/// `GET /v1/products/{id}` with an `X-API-Key` header.
pub struct VidaXlAdapter {
    endpoint: HttpEndpoint,
}

impl VidaXlAdapter {
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
impl SupplierAdapter for VidaXlAdapter {
    fn connector(&self) -> &'static str {
        "vidaxl"
    }

    async fn fetch_stock(
        &self,
        supplier: &SupplierDescriptor,
        external_id: &str,
    ) -> Result<u32, FetchError> {
        let external_id = require_external_id(external_id)?;
        let api_key = require_secret(supplier, |c| c.api_key.as_ref())?;

        let url = self
            .endpoint
            .url(&format!("v1/products/{}", encode_segment(external_id)))?;
        let request = self.endpoint.get(url).header("X-API-Key", api_key);
        let body = self.endpoint.send_json(request, external_id).await?;

        parse_quantity(body.get("stock"), "stock")
    }
}
