//! Provider catalog: per-provider, per-environment connection metadata.
//!
//! Built once from the built-in sellers merged with caller overrides and
//! immutable afterwards.

use crate::config::{DeploymentConfig, Environment, ProductConfig};
use crate::SellergateError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sellers whose metadata ships with the crate.
pub const BUILTIN_SELLERS: [&str; 2] = ["aivec", "welcart"];

/// Connection metadata for one provider in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointMeta {
    /// Origin allowed to call back into the host.
    pub origin: String,
    /// Base URL of the provider API.
    pub api_endpoint: String,
    /// Human-readable seller site label.
    pub seller_site: String,
}

/// Partially specified endpoint metadata supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointOverride {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub seller_site: Option<String>,
}

impl EndpointOverride {
    /// Fully specified override.
    pub fn new(
        origin: impl Into<String>,
        api_endpoint: impl Into<String>,
        seller_site: impl Into<String>,
    ) -> Self {
        Self {
            origin: Some(origin.into()),
            api_endpoint: Some(api_endpoint.into()),
            seller_site: Some(seller_site.into()),
        }
    }

    /// The first field that is absent or blank.
    fn missing_key(&self) -> Option<&'static str> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !present(&self.origin) {
            Some("origin")
        } else if !present(&self.api_endpoint) {
            Some("api_endpoint")
        } else if !present(&self.seller_site) {
            Some("seller_site")
        } else {
            None
        }
    }

    fn complete(&self) -> Option<EndpointMeta> {
        Some(EndpointMeta {
            origin: self.origin.clone()?,
            api_endpoint: self.api_endpoint.clone()?,
            seller_site: self.seller_site.clone()?,
        })
        .filter(|_| self.missing_key().is_none())
    }

    /// Fill absent fields from a fallback.
    fn fill_from(&self, fallback: &EndpointMeta) -> EndpointMeta {
        let pick = |v: &Option<String>, default: &str| {
            v.as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(default)
                .to_string()
        };
        EndpointMeta {
            origin: pick(&self.origin, &fallback.origin),
            api_endpoint: pick(&self.api_endpoint, &fallback.api_endpoint),
            seller_site: pick(&self.seller_site, &fallback.seller_site),
        }
    }
}

/// Caller-supplied metadata for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetaOverride {
    #[serde(default)]
    pub prod: Option<EndpointOverride>,
    #[serde(default)]
    pub staging: Option<EndpointOverride>,
    #[serde(default)]
    pub dev: Option<EndpointOverride>,
}

impl ProviderMetaOverride {
    /// Override with production metadata only.
    pub fn prod(meta: EndpointOverride) -> Self {
        Self {
            prod: Some(meta),
            ..Self::default()
        }
    }

    /// Add staging metadata.
    pub fn with_staging(mut self, meta: EndpointOverride) -> Self {
        self.staging = Some(meta);
        self
    }

    /// Add dev metadata.
    pub fn with_dev(mut self, meta: EndpointOverride) -> Self {
        self.dev = Some(meta);
        self
    }
}

static BUILTIN_META: Lazy<BTreeMap<&'static str, ProviderMetaOverride>> = Lazy::new(|| {
    let mut meta = BTreeMap::new();
    meta.insert(
        "aivec",
        ProviderMetaOverride::prod(EndpointOverride::new(
            "https://aivec.co.jp",
            "https://www.aivec.co.jp/plugin/",
            "aivec.co.jp/plugin",
        ))
        .with_staging(EndpointOverride::new(
            "https://aivec.co.jp",
            "https://www.aivec.co.jp/plugin_test/",
            "aivec.co.jp/plugin_test",
        )),
    );
    meta.insert(
        "welcart",
        ProviderMetaOverride::prod(EndpointOverride::new(
            "https://www.welcart.com",
            "https://www.welcart.com/",
            "www.welcart.com",
        ))
        .with_staging(EndpointOverride::new(
            "https://php7.welcart.org",
            "https://php7.welcart.org/",
            "php7.welcart.org",
        )),
    );
    meta
});

/// Resolved endpoints for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    /// Production metadata (always present).
    pub prod: EndpointMeta,
    /// Staging metadata.
    pub staging: Option<EndpointMeta>,
    /// Local development metadata.
    pub dev: Option<EndpointMeta>,
}

impl ProviderEndpoints {
    /// Metadata for an environment, falling back to `prod`.
    pub fn for_environment(&self, environment: Environment) -> &EndpointMeta {
        let chosen = match environment {
            Environment::Prod => None,
            Environment::Staging => self.staging.as_ref(),
            Environment::Dev => self.dev.as_ref(),
        };
        chosen.unwrap_or(&self.prod)
    }
}

/// Immutable mapping of provider name to environment endpoints.
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    environment: Environment,
    sellers: Vec<String>,
    default_provider: String,
    providers: BTreeMap<String, ProviderEndpoints>,
}

impl ProviderCatalog {
    /// Build and validate the catalog for a product.
    ///
    /// # Errors
    /// `InvalidConfiguration` if:
    /// - `sellers` is empty or contains no built-in seller
    /// - `default_provider` is not in `sellers`
    /// - an allowed seller lacks complete `prod` metadata
    pub fn build(product: &ProductConfig, deployment: &DeploymentConfig) -> Result<Self, SellergateError> {
        validate_sellers(&product.sellers)?;

        if !product.sellers.contains(&product.default_provider) {
            return Err(SellergateError::InvalidConfiguration(format!(
                "default_provider '{}' does not exist in sellers",
                product.default_provider
            )));
        }

        let mut merged: BTreeMap<String, ProviderMetaOverride> = BUILTIN_META
            .iter()
            .map(|(name, meta)| (name.to_string(), meta.clone()))
            .collect();
        for (name, meta) in &product.provider_overrides {
            merged.insert(name.clone(), meta.clone());
        }

        for seller in &product.sellers {
            let meta = merged.get(seller).ok_or_else(|| {
                SellergateError::InvalidConfiguration(format!(
                    "seller '{}' missing from provider metadata",
                    seller
                ))
            })?;
            let prod = meta.prod.as_ref().ok_or_else(|| {
                SellergateError::InvalidConfiguration(format!(
                    "seller '{}' missing 'prod' key in provider metadata",
                    seller
                ))
            })?;
            if let Some(key) = prod.missing_key() {
                return Err(SellergateError::InvalidConfiguration(format!(
                    "seller '{}' missing '{}' key in provider metadata under prod",
                    seller, key
                )));
            }
        }

        let bridge_url = deployment.bridge.as_ref().map(|b| b.base_url());
        let mut providers = BTreeMap::new();
        for (name, meta) in merged {
            // Providers outside the allow-list are only kept when resolvable
            let Some(prod) = meta.prod.as_ref().and_then(EndpointOverride::complete) else {
                tracing::debug!(provider = %name, "skipping provider without complete prod metadata");
                continue;
            };
            let staging = meta.staging.as_ref().map(|s| s.fill_from(&prod));
            let dev = match (meta.dev.as_ref(), bridge_url.as_ref()) {
                (Some(dev), _) => Some(dev.fill_from(&prod)),
                (None, Some(url)) => Some(EndpointMeta {
                    origin: url.clone(),
                    api_endpoint: url.clone(),
                    seller_site: format!("{} ({})", url, name),
                }),
                (None, None) => None,
            };
            providers.insert(name, ProviderEndpoints { prod, staging, dev });
        }

        Ok(Self {
            environment: deployment.environment,
            sellers: product.sellers.clone(),
            default_provider: product.default_provider.clone(),
            providers,
        })
    }

    /// Active deployment environment.
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Allow-listed provider names, in configured order.
    pub fn sellers(&self) -> &[String] {
        &self.sellers
    }

    /// Provider used when none has been chosen.
    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// Whether the installer may switch to this provider.
    pub fn is_allowed(&self, provider: &str) -> bool {
        self.sellers.iter().any(|s| s == provider)
    }

    /// Whether metadata exists for this provider.
    pub fn contains(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }

    /// All endpoints for a provider.
    pub fn provider(&self, provider: &str) -> Option<&ProviderEndpoints> {
        self.providers.get(provider)
    }

    /// Endpoint metadata for a provider in the active environment.
    pub fn endpoint(&self, provider: &str) -> Option<&EndpointMeta> {
        self.providers
            .get(provider)
            .map(|p| p.for_environment(self.environment))
    }
}

fn validate_sellers(sellers: &[String]) -> Result<(), SellergateError> {
    if sellers.is_empty() {
        return Err(SellergateError::InvalidConfiguration(
            "sellers cannot be empty".to_string(),
        ));
    }
    if !sellers.iter().any(|s| BUILTIN_SELLERS.contains(&s.as_str())) {
        return Err(SellergateError::InvalidConfiguration(format!(
            "at least one of {:?} must be in sellers",
            BUILTIN_SELLERS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeAddress;

    fn product() -> ProductConfig {
        ProductConfig::new("widget", "1.0.0", "Widget")
    }

    fn acme() -> ProviderMetaOverride {
        ProviderMetaOverride::prod(EndpointOverride::new(
            "https://acme.example",
            "https://api.acme.example/",
            "acme.example",
        ))
    }

    fn expect_config_error(result: Result<ProviderCatalog, SellergateError>, needle: &str) {
        match result {
            Err(SellergateError::InvalidConfiguration(msg)) => {
                assert!(msg.contains(needle), "'{}' not in '{}'", needle, msg)
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_builtin_defaults() {
        let catalog = ProviderCatalog::build(&product(), &DeploymentConfig::prod()).unwrap();
        let endpoint = catalog.endpoint("aivec").unwrap();
        assert_eq!(endpoint.api_endpoint, "https://www.aivec.co.jp/plugin/");
        assert!(catalog.contains("welcart"));
        assert!(!catalog.is_allowed("welcart"));
    }

    #[test]
    fn test_rejects_empty_sellers() {
        let config = product().with_sellers(Vec::<String>::new(), "aivec");
        expect_config_error(ProviderCatalog::build(&config, &DeploymentConfig::prod()), "empty");
    }

    #[test]
    fn test_requires_a_builtin_seller() {
        let config = product()
            .with_sellers(["acme"], "acme")
            .with_override("acme", acme());
        expect_config_error(
            ProviderCatalog::build(&config, &DeploymentConfig::prod()),
            "must be in sellers",
        );
    }

    #[test]
    fn test_default_provider_must_be_allowed() {
        let config = product().with_sellers(["aivec"], "welcart");
        expect_config_error(
            ProviderCatalog::build(&config, &DeploymentConfig::prod()),
            "default_provider 'welcart'",
        );
    }

    #[test]
    fn test_custom_seller_requires_metadata() {
        let config = product().with_sellers(["aivec", "acme"], "aivec");
        expect_config_error(
            ProviderCatalog::build(&config, &DeploymentConfig::prod()),
            "seller 'acme' missing from provider metadata",
        );
    }

    #[test]
    fn test_custom_seller_reports_missing_key() {
        let incomplete = ProviderMetaOverride::prod(EndpointOverride {
            origin: Some("https://acme.example".to_string()),
            api_endpoint: None,
            seller_site: Some("acme.example".to_string()),
        });
        let config = product()
            .with_sellers(["aivec", "acme"], "aivec")
            .with_override("acme", incomplete);
        expect_config_error(
            ProviderCatalog::build(&config, &DeploymentConfig::prod()),
            "missing 'api_endpoint' key",
        );

        let no_prod = ProviderMetaOverride::default()
            .with_staging(EndpointOverride::new("o", "e", "s"));
        let config = product()
            .with_sellers(["aivec", "acme"], "aivec")
            .with_override("acme", no_prod);
        expect_config_error(
            ProviderCatalog::build(&config, &DeploymentConfig::prod()),
            "missing 'prod' key",
        );
    }

    #[test]
    fn test_custom_seller_accepted() {
        let config = product()
            .with_sellers(["aivec", "acme"], "acme")
            .with_override("acme", acme());
        let catalog = ProviderCatalog::build(&config, &DeploymentConfig::prod()).unwrap();
        assert!(catalog.is_allowed("acme"));
        assert_eq!(catalog.default_provider(), "acme");
        assert_eq!(catalog.endpoint("acme").unwrap().seller_site, "acme.example");
    }

    #[test]
    fn test_staging_selected_and_filled_from_prod() {
        let partial = acme().with_staging(EndpointOverride {
            api_endpoint: Some("https://staging.acme.example/".to_string()),
            ..EndpointOverride::default()
        });
        let config = product()
            .with_sellers(["aivec", "acme"], "aivec")
            .with_override("acme", partial);
        let deployment = DeploymentConfig {
            environment: Environment::Staging,
            bridge: None,
        };
        let catalog = ProviderCatalog::build(&config, &deployment).unwrap();

        let staging = catalog.endpoint("acme").unwrap();
        assert_eq!(staging.api_endpoint, "https://staging.acme.example/");
        assert_eq!(staging.origin, "https://acme.example");
        assert_eq!(
            catalog.endpoint("aivec").unwrap().api_endpoint,
            "https://www.aivec.co.jp/plugin_test/"
        );
    }

    #[test]
    fn test_dev_without_bridge_falls_back_to_prod() {
        let deployment = DeploymentConfig {
            environment: Environment::Dev,
            bridge: None,
        };
        let catalog = ProviderCatalog::build(&product(), &deployment).unwrap();
        assert_eq!(
            catalog.endpoint("aivec").unwrap().api_endpoint,
            "https://www.aivec.co.jp/plugin/"
        );
    }

    #[test]
    fn test_dev_uses_bridge_address() {
        let deployment = DeploymentConfig {
            environment: Environment::Dev,
            bridge: Some(BridgeAddress {
                ip: "172.17.0.1".to_string(),
                port: "9000".to_string(),
            }),
        };
        let catalog = ProviderCatalog::build(&product(), &deployment).unwrap();
        let dev = catalog.endpoint("aivec").unwrap();
        assert_eq!(dev.api_endpoint, "http://172.17.0.1:9000");
        assert_eq!(dev.seller_site, "http://172.17.0.1:9000 (aivec)");
    }

    #[test]
    fn test_overrides_deserialize_from_json() {
        let json = r#"{"prod":{"origin":"https://acme.example","api_endpoint":"https://api.acme.example/","seller_site":"acme.example"}}"#;
        let meta: ProviderMetaOverride = serde_json::from_str(json).unwrap();
        assert_eq!(meta, acme());
    }
}
