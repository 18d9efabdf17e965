use async_trait::async_trait;

use super::{parse_quantity, require_external_id, require_secret, HttpEndpoint, HttpSettings};
use crate::{FetchError, SupplierAdapter, SupplierDescriptor};

const DEFAULT_BASE_URL: &str = "https://api.btswholesaler.com";

/// `GET /v1/api/getProduct?id={id}`; the bearer is the API key, or the
/// account username when no key is stored.
pub struct BtsWholesalerAdapter {
    endpoint: HttpEndpoint,
}

impl BtsWholesalerAdapter {
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
impl SupplierAdapter for BtsWholesalerAdapter {
    fn connector(&self) -> &'static str {
        "btswholesaler"
    }

    async fn fetch_stock(
        &self,
        supplier: &SupplierDescriptor,
        external_id: &str,
    ) -> Result<u32, FetchError> {
        let external_id = require_external_id(external_id)?;
        let bearer = require_secret(supplier, |c| {
            c.api_key
                .as_ref()
                .filter(|k| !k.trim().is_empty())
                .or(c.username.as_ref())
        })?;

        let mut url = self.endpoint.url("v1/api/getProduct")?;
        url.query_pairs_mut().append_pair("id", external_id);
        let body = self
            .endpoint
            .send_json(self.endpoint.get(url).bearer_auth(bearer), external_id)
            .await?;

        let product = body
            .get("product")
            .ok_or_else(|| FetchError::malformed("product", "missing"))?;
        parse_quantity(product.get("stock"), "product.stock")
    }
}
