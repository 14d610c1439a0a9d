//! Provider selection and endpoint resolution for a product.

use crate::provider::catalog::{EndpointMeta, ProviderCatalog};
use crate::store::{EntitlementRecord, EntitlementStore};
use crate::SellergateError;

/// Connection metadata resolved for the next validation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// Provider the metadata belongs to.
    pub provider: String,
    /// Provider origin.
    pub origin: String,
    /// Base API endpoint.
    pub endpoint: String,
    /// Seller site label.
    pub seller_site: String,
}

impl ResolvedEndpoint {
    fn new(provider: &str, meta: &EndpointMeta) -> Self {
        Self {
            provider: provider.to_string(),
            origin: meta.origin.clone(),
            endpoint: meta.api_endpoint.clone(),
            seller_site: meta.seller_site.clone(),
        }
    }
}

/// An option for the host's seller selection UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerChoice {
    /// Provider name submitted back through `switch_provider`.
    pub provider: String,
    /// Label to display.
    pub seller_site: String,
    /// Whether this is the stored selection.
    pub selected: bool,
}

/// Resolves endpoints and mediates provider switches.
///
/// Callers must hold the product's validation guard around
/// [`ProviderRegistry::switch_provider`] and [`ProviderRegistry::ensure_record`]
/// so these writes serialize with validation results.
#[derive(Clone)]
pub struct ProviderRegistry {
    catalog: ProviderCatalog,
    store: EntitlementStore,
}

impl ProviderRegistry {
    /// Registry over a validated catalog.
    pub fn new(catalog: ProviderCatalog, store: EntitlementStore) -> Self {
        Self { catalog, store }
    }

    /// The underlying catalog.
    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// Resolve the endpoint to validate against.
    ///
    /// A known `provider_override` takes precedence over the stored
    /// selection; a stored provider that is no longer configured falls back
    /// to the default.
    pub fn resolve(
        &self,
        product_id: &str,
        provider_override: Option<&str>,
    ) -> Result<ResolvedEndpoint, SellergateError> {
        let stored = self.load_readable(product_id).map(|r| r.provider);
        let provider = self.select_provider(stored.as_deref(), provider_override);
        let meta = self.catalog.endpoint(provider).ok_or_else(|| {
            SellergateError::InvalidConfiguration(format!(
                "provider '{}' has no endpoint metadata",
                provider
            ))
        })?;
        Ok(ResolvedEndpoint::new(provider, meta))
    }

    /// Stored record, treating an unreadable one as absent.
    fn load_readable(&self, product_id: &str) -> Option<EntitlementRecord> {
        match self.store.load(product_id) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(product_id, error = %e, "unreadable entitlement record, using defaults");
                None
            }
        }
    }

    fn select_provider<'a>(&'a self, stored: Option<&'a str>, provider_override: Option<&'a str>) -> &'a str {
        if let Some(p) = provider_override.filter(|p| self.catalog.contains(p)) {
            return p;
        }
        match stored {
            Some(p) if self.catalog.is_allowed(p) && self.catalog.contains(p) => p,
            _ => self.catalog.default_provider(),
        }
    }

    /// Create the product's record, or refresh its provider metadata.
    ///
    /// Verdict fields of an existing record are kept. A stored provider that
    /// left the allow-list is replaced by the default. An unreadable record
    /// is replaced by a fresh one.
    pub fn ensure_record(&self, product_id: &str) -> Result<EntitlementRecord, SellergateError> {
        let existing = self.load_readable(product_id);
        let resolved = self.resolve(product_id, None)?;
        let meta = EndpointMeta {
            origin: resolved.origin,
            api_endpoint: resolved.endpoint,
            seller_site: resolved.seller_site,
        };

        let record = match existing {
            Some(mut record) => {
                if record.provider != resolved.provider {
                    tracing::info!(
                        product_id,
                        from = %record.provider,
                        to = %resolved.provider,
                        "stored provider not allowed, reset to default"
                    );
                }
                record.apply_provider(resolved.provider, &meta);
                record
            }
            None => EntitlementRecord::new(product_id, resolved.provider, &meta),
        };

        self.store.save(&record)?;
        Ok(record)
    }

    /// Persist a new provider selection and force re-validation.
    ///
    /// # Errors
    /// `InvalidProvider` if `provider` is not allow-listed; nothing is written.
    pub fn switch_provider(
        &self,
        product_id: &str,
        provider: &str,
    ) -> Result<EntitlementRecord, SellergateError> {
        let meta = match self.catalog.endpoint(provider) {
            Some(meta) if self.catalog.is_allowed(provider) => meta.clone(),
            _ => {
                return Err(SellergateError::InvalidProvider {
                    provider: provider.to_string(),
                })
            }
        };

        let mut record = match self.load_readable(product_id) {
            Some(record) => record,
            None => self.ensure_record(product_id)?,
        };
        record.apply_provider(provider, &meta);
        record.invalidate();
        self.store.save(&record)?;

        tracing::info!(product_id, provider, "provider switched");
        Ok(record)
    }

    /// Seller options for the host's selection UI.
    ///
    /// Empty when only one seller is configured: there is nothing to choose.
    pub fn seller_choices(&self, product_id: &str) -> Result<Vec<SellerChoice>, SellergateError> {
        if self.catalog.sellers().len() < 2 {
            return Ok(Vec::new());
        }
        let current = self.resolve(product_id, None)?.provider;
        Ok(self
            .catalog
            .sellers()
            .iter()
            .filter_map(|seller| {
                self.catalog.endpoint(seller).map(|meta| SellerChoice {
                    provider: seller.clone(),
                    seller_site: meta.seller_site.clone(),
                    selected: *seller == current,
                })
            })
            .collect())
    }
}
