//! HTTP adapters, one per supplier integration.
//!
//! Every adapter owns an [`HttpEndpoint`] (a configured `reqwest::Client`
//! plus base URL) so tests can point it at a wiremock server through
//! `with_base_url`.

mod bigbuy;
mod btswholesaler;
mod cjdropshipping;
mod matterhorn;
mod vidaxl;

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;

use crate::credentials::SupplierDescriptor;
use crate::error::{status_error, FetchError};

pub use bigbuy::BigBuyAdapter;
pub use btswholesaler::BtsWholesalerAdapter;
pub use cjdropshipping::{CjDropshippingAdapter, CJ_AVAILABLE_QUANTITY};
pub use matterhorn::MatterhornAdapter;
pub use vidaxl::VidaXlAdapter;

/// Outbound HTTP settings shared by every adapter.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "stocksync/0.1 (stock-sync)".to_string(),
        }
    }
}

pub(crate) struct HttpEndpoint {
    client: Client,
    base_url: Url,
}

impl HttpEndpoint {
    pub(crate) fn new(base_url: &str, settings: &HttpSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.timeout_secs.min(10)))
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(FetchError::Client)?;

        // Exactly one trailing slash so `join` appends rather than replaces.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| FetchError::malformed("base URL", format!("'{base_url}': {e}")))?;

        Ok(Self { client, base_url })
    }

    pub(crate) fn url(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| FetchError::malformed("request URL", e.to_string()))
    }

    pub(crate) fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    pub(crate) fn post(&self, url: Url) -> RequestBuilder {
        self.client.post(url)
    }

    /// Sends the request and decodes a 2xx JSON body. Non-2xx statuses are
    /// mapped through [`status_error`].
    pub(crate) async fn send_json(
        &self,
        request: RequestBuilder,
        external_id: &str,
    ) -> Result<Value, FetchError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), external_id));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| FetchError::malformed(format!("product {external_id}"), e.to_string()))
    }
}

/// Everything except RFC 3986 unreserved characters.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn encode_segment(external_id: &str) -> String {
    utf8_percent_encode(external_id, SEGMENT).to_string()
}

pub(crate) fn require_external_id(external_id: &str) -> Result<&str, FetchError> {
    let trimmed = external_id.trim();
    if trimmed.is_empty() {
        return Err(FetchError::EmptyExternalId);
    }
    Ok(trimmed)
}

/// Returns the first non-blank credential picked by `pick`.
pub(crate) fn require_secret<'a>(
    supplier: &'a SupplierDescriptor,
    pick: impl Fn(&'a crate::SupplierCredentials) -> Option<&'a String>,
) -> Result<&'a str, FetchError> {
    supplier
        .credentials
        .as_ref()
        .and_then(pick)
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| FetchError::MissingCredentials {
            supplier: supplier.name.clone(),
        })
}

/// Reads a stock quantity from a JSON number or numeric string. Negative
/// values clamp to zero; fractional values are truncated.
pub(crate) fn parse_quantity(value: Option<&Value>, field: &str) -> Result<u32, FetchError> {
    let raw = value.ok_or_else(|| FetchError::malformed(field, "missing"))?;
    let parsed = match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(truncate_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(truncate_f64))
        }
        _ => None,
    };
    let quantity = parsed.ok_or_else(|| FetchError::malformed(field, format!("not a number: {raw}")))?;
    Ok(u32::try_from(quantity.max(0)).unwrap_or(u32::MAX))
}

#[allow(clippy::cast_possible_truncation)]
fn truncate_f64(value: f64) -> i64 {
    value.trunc() as i64
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn quantity_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_quantity(Some(&json!(12)), "stock").unwrap(), 12);
        assert_eq!(parse_quantity(Some(&json!("7")), "stock").unwrap(), 7);
        assert_eq!(parse_quantity(Some(&json!(" 3 ")), "stock").unwrap(), 3);
        assert_eq!(parse_quantity(Some(&json!(4.9)), "stock").unwrap(), 4);
    }

    #[test]
    fn negative_quantity_clamps_to_zero() {
        assert_eq!(parse_quantity(Some(&json!(-5)), "stock").unwrap(), 0);
        assert_eq!(parse_quantity(Some(&json!("-2")), "stock").unwrap(), 0);
    }

    #[test]
    fn missing_or_non_numeric_quantity_is_malformed() {
        assert!(matches!(
            parse_quantity(None, "stock"),
            Err(FetchError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_quantity(Some(&json!("plenty")), "stock"),
            Err(FetchError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_quantity(Some(&json!(null)), "stock"),
            Err(FetchError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn external_id_is_trimmed_and_required() {
        assert_eq!(require_external_id(" SKU-1 ").unwrap(), "SKU-1");
        assert!(matches!(
            require_external_id("   "),
            Err(FetchError::EmptyExternalId)
        ));
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        assert_eq!(encode_segment("A/B 1"), "A%2FB%201");
        assert_eq!(encode_segment("SKU-1_a.b~c"), "SKU-1_a.b~c");
    }

    #[test]
    fn url_joins_under_base_path() {
        let endpoint =
            HttpEndpoint::new("https://api.example.com/v2", &HttpSettings::default()).unwrap();
        let url = endpoint.url("/products/42").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/products/42");
    }
}
