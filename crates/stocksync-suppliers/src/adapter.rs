use async_trait::async_trait;

use crate::credentials::SupplierDescriptor;
use crate::error::FetchError;

/// Translates one supplier's stock API into a plain non-negative quantity.
///
/// Implementations perform exactly one logical outbound call per
/// invocation and mutate no local state.
#[async_trait]
pub trait SupplierAdapter: Send + Sync {
    /// Lower-case connector key this adapter is registered under.
    fn connector(&self) -> &'static str;

    /// Returns the current stock for `external_id`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::EmptyExternalId`] for a blank id,
    /// [`FetchError::MissingCredentials`] when the supplier carries no usable
    /// credential, and the HTTP-derived kinds for everything else.
    async fn fetch_stock(
        &self,
        supplier: &SupplierDescriptor,
        external_id: &str,
    ) -> Result<u32, FetchError>;
}
