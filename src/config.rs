//! Sellergate configuration.
//!
//! Request details and deployment flags are passed in explicitly through
//! these types instead of being read from process globals.

use crate::provider::catalog::{ProviderMetaOverride, BUILTIN_SELLERS};
use crate::SellergateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// How often the host's timer infrastructure should tick the recurring check.
///
/// Ticks before the next daily anchor are no-ops.
pub const POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Timeout for a single validation request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Host action name used by high-frequency keep-alive polling.
pub const HEARTBEAT_ACTION: &str = "heartbeat";

/// Per-product configuration supplied by the host at initialization.
#[derive(Debug, Clone)]
pub struct ProductConfig {
    /// Stable identifier of the licensed unit.
    pub product_id: String,

    /// Version of the product being validated.
    pub product_version: String,

    /// Name shown in warning banners.
    pub display_name: String,

    /// Allow-list of provider names the installer may choose from.
    pub sellers: Vec<String>,

    /// Provider used until the installer picks another one.
    pub default_provider: String,

    /// Extra or replacement provider metadata, keyed by provider name.
    pub provider_overrides: BTreeMap<String, ProviderMetaOverride>,
}

impl ProductConfig {
    /// Config with the first built-in seller as the only provider.
    pub fn new(
        product_id: impl Into<String>,
        product_version: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let default = BUILTIN_SELLERS[0].to_string();
        Self {
            product_id: product_id.into(),
            product_version: product_version.into(),
            display_name: display_name.into(),
            sellers: vec![default.clone()],
            default_provider: default,
            provider_overrides: BTreeMap::new(),
        }
    }

    /// Replace the seller allow-list and default provider.
    pub fn with_sellers<S: Into<String>>(
        mut self,
        sellers: impl IntoIterator<Item = S>,
        default_provider: impl Into<String>,
    ) -> Self {
        self.sellers = sellers.into_iter().map(Into::into).collect();
        self.default_provider = default_provider.into();
        self
    }

    /// Add provider metadata for a seller.
    pub fn with_override(mut self, provider: impl Into<String>, meta: ProviderMetaOverride) -> Self {
        self.provider_overrides.insert(provider.into(), meta);
        self
    }

    /// Validate the product-level fields.
    ///
    /// Seller/provider consistency is checked when the catalog is built.
    pub fn validate(&self) -> Result<(), SellergateError> {
        if self.product_id.trim().is_empty() {
            return Err(SellergateError::InvalidConfiguration(
                "product_id cannot be empty".to_string(),
            ));
        }
        if self.product_id.contains('/') {
            return Err(SellergateError::InvalidConfiguration(format!(
                "product_id '{}' cannot contain '/'",
                self.product_id
            )));
        }
        if self.product_version.trim().is_empty() {
            return Err(SellergateError::InvalidConfiguration(
                "product_version cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deployment environment tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production endpoints.
    #[default]
    Prod,
    /// Staging endpoints.
    Staging,
    /// Local development through a bridge address.
    Dev,
}

impl Environment {
    /// Short tag used in catalogs and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Staging => "staging",
            Environment::Dev => "dev",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = SellergateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" | "" => Ok(Environment::Prod),
            "staging" => Ok(Environment::Staging),
            "dev" | "development" => Ok(Environment::Dev),
            other => Err(SellergateError::InvalidConfiguration(format!(
                "unknown environment '{}'",
                other
            ))),
        }
    }
}

/// Address of a locally running provider used in development.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeAddress {
    /// Bridge host or IP.
    pub ip: String,
    /// Bridge port.
    pub port: String,
}

impl BridgeAddress {
    /// `http://<ip>:<port>`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }
}

/// Process-wide deployment configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentConfig {
    /// Which endpoint set to use.
    pub environment: Environment,
    /// Local bridge for the `dev` environment.
    pub bridge: Option<BridgeAddress>,
}

impl DeploymentConfig {
    /// Environment variable selecting the endpoint set.
    pub const ENV_VAR: &'static str = "SELLERGATE_ENV";
    /// Environment variable holding the dev bridge IP.
    pub const BRIDGE_IP_VAR: &'static str = "SELLERGATE_BRIDGE_IP";
    /// Environment variable holding the dev bridge port.
    pub const BRIDGE_PORT_VAR: &'static str = "SELLERGATE_BRIDGE_PORT";

    /// Production deployment with no bridge.
    pub fn prod() -> Self {
        Self::default()
    }

    /// Read deployment settings from the process environment.
    pub fn from_env() -> Result<Self, SellergateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read deployment settings through an arbitrary lookup.
    ///
    /// An unrecognized environment name is logged and treated as `prod`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SellergateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup(Self::ENV_VAR) {
            Some(value) => value.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to prod endpoints");
                Environment::Prod
            }),
            None => Environment::Prod,
        };

        let ip = lookup(Self::BRIDGE_IP_VAR).filter(|v| !v.trim().is_empty());
        let port = lookup(Self::BRIDGE_PORT_VAR).unwrap_or_default();
        let bridge = ip.map(|ip| BridgeAddress {
            ip: ip.trim().to_string(),
            port: port.trim().to_string(),
        });

        Ok(Self {
            environment,
            bridge,
        })
    }
}

/// Details of the host event that triggered the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Domain of this install, as registered with the seller.
    pub host: String,
    /// Name of the host action being served, if any.
    pub action: Option<String>,
}

impl RequestContext {
    /// Context for a known host domain.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            action: None,
        }
    }

    /// Attach the current action name.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Resolve the install domain from header-like candidates.
    ///
    /// Candidates are tried in order (typically forwarded host, host header,
    /// server name); the first non-empty one wins.
    pub fn from_host_candidates(candidates: &[Option<&str>], action: Option<&str>) -> Self {
        let host = candidates
            .iter()
            .flatten()
            .map(|raw| extract_host(raw))
            .find(|h| !h.is_empty())
            .unwrap_or_default();

        Self {
            host,
            action: action.map(String::from),
        }
    }

    /// Lightweight keep-alive requests must not trigger validation.
    pub fn is_heartbeat(&self) -> bool {
        self.action.as_deref() == Some(HEARTBEAT_ACTION)
    }
}

/// Extract the host component of a URL or bare authority.
///
/// IPv6 literals keep their brackets. Unparseable input yields an empty string.
fn extract_host(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    let parsed = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("http://{}", raw))
    };
    match parsed {
        Ok(url) => url.host_str().unwrap_or_default().to_string(),
        Err(e) => {
            tracing::debug!(candidate = raw, error = %e, "host candidate is not a valid authority");
            String::new()
        }
    }
}

/// Opaque diagnostic payload describing the running host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentFingerprint {
    /// Host platform version string.
    pub host_platform_version: String,
    /// Runtime version string.
    pub runtime_version: String,
    /// Any further diagnostics (web server, database version, ...).
    pub diagnostics: BTreeMap<String, String>,
}

impl EnvironmentFingerprint {
    /// Fingerprint with platform and runtime versions.
    pub fn new(host_platform_version: impl Into<String>, runtime_version: impl Into<String>) -> Self {
        Self {
            host_platform_version: host_platform_version.into(),
            runtime_version: runtime_version.into(),
            diagnostics: BTreeMap::new(),
        }
    }

    /// Add a diagnostic entry.
    pub fn with_diagnostic(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.diagnostics.insert(key.into(), value.into());
        self
    }
}
