//! Supplier stock adapters: one HTTP integration per supplier behind a
//! single [`SupplierAdapter`] trait, resolved through a [`SupplierRegistry`].

pub mod adapter;
pub mod adapters;
pub mod credentials;
pub mod error;
pub mod registry;
pub mod retry;

pub use adapter::SupplierAdapter;
pub use adapters::{
    BigBuyAdapter, BtsWholesalerAdapter, CjDropshippingAdapter, HttpSettings, MatterhornAdapter,
    VidaXlAdapter, CJ_AVAILABLE_QUANTITY,
};
pub use credentials::{SupplierCredentials, SupplierDescriptor};
pub use error::FetchError;
pub use registry::SupplierRegistry;
pub use retry::retry_with_backoff;
