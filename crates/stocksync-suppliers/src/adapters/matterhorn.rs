use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;

use super::{
    encode_segment, parse_quantity, require_external_id, require_secret, HttpEndpoint,
    HttpSettings,
};
use crate::{FetchError, SupplierAdapter, SupplierDescriptor};

const DEFAULT_BASE_URL: &str = "https://matterhorn-wholesale.com";

/// `GET /B2BAPI/ITEMS/{id}` with the raw API key in `Authorization`.
/// `stock_total` may arrive as a number or a numeric string.
pub struct MatterhornAdapter {
    endpoint: HttpEndpoint,
}

impl MatterhornAdapter {
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
impl SupplierAdapter for MatterhornAdapter {
    fn connector(&self) -> &'static str {
        "matterhorn"
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
            .url(&format!("B2BAPI/ITEMS/{}", encode_segment(external_id)))?;
        let request = self.endpoint.get(url).header(AUTHORIZATION, api_key);
        let body = self.endpoint.send_json(request, external_id).await?;

        parse_quantity(body.get("stock_total"), "stock_total")
    }
}
