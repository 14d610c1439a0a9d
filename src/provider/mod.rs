//! Remote authorities ("providers") and their connection metadata.

pub mod catalog;
pub mod registry;

pub use catalog::{
    EndpointMeta, EndpointOverride, ProviderCatalog, ProviderEndpoints, ProviderMetaOverride,
    BUILTIN_SELLERS,
};
pub use registry::{ProviderRegistry, ResolvedEndpoint, SellerChoice};
