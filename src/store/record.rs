//! Persisted entitlement record, one per product.

use crate::protocol::LicensedItemMeta;
use crate::provider::catalog::EndpointMeta;
use crate::SellergateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authentication state of a product, derived from its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Never checked, or reset by a provider switch.
    Unvalidated,
    /// Last check succeeded (or failed open).
    Validated,
    /// Last check returned an entitlement failure.
    Failed,
}

/// Cached verdict and provider metadata for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementRecord {
    /// Primary key.
    #[serde(default)]
    pub product_id: String,

    /// Cached entitlement verdict.
    #[serde(default)]
    pub verified: bool,

    /// Last human-readable failure reason; empty when verified.
    #[serde(default)]
    pub error_message: String,

    /// Currently selected provider name.
    #[serde(default)]
    pub provider: String,

    /// Provider origin for the active environment.
    #[serde(rename = "originURL", default)]
    pub origin_url: String,

    /// Provider API endpoint for the active environment.
    #[serde(rename = "endpointURL", default)]
    pub endpoint_url: String,

    /// Human-readable seller site label.
    #[serde(default)]
    pub seller_site_label: String,

    /// Terms-of-use metadata from the last response that carried it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licensed_item_meta: Option<LicensedItemMeta>,

    /// When the last validation attempt completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,

    /// When the recurring check is next due.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_check_at: Option<DateTime<Utc>>,
}

impl EntitlementRecord {
    /// Fresh, unverified record for a product.
    pub fn new(product_id: impl Into<String>, provider: impl Into<String>, meta: &EndpointMeta) -> Self {
        let mut record = Self {
            product_id: product_id.into(),
            verified: false,
            error_message: String::new(),
            provider: String::new(),
            origin_url: String::new(),
            endpoint_url: String::new(),
            seller_site_label: String::new(),
            licensed_item_meta: None,
            last_checked_at: None,
            next_check_at: None,
        };
        record.apply_provider(provider, meta);
        record
    }

    /// Point the record at a provider's endpoint metadata.
    pub fn apply_provider(&mut self, provider: impl Into<String>, meta: &EndpointMeta) {
        self.provider = provider.into();
        self.origin_url = meta.origin.clone();
        self.endpoint_url = meta.api_endpoint.clone();
        self.seller_site_label = meta.seller_site.clone();
    }

    /// Record a successful (or fail-open) check.
    pub fn mark_verified(&mut self, meta: Option<LicensedItemMeta>, now: DateTime<Utc>) {
        self.verified = true;
        self.error_message.clear();
        if meta.is_some() {
            self.licensed_item_meta = meta;
        }
        self.last_checked_at = Some(now);
    }

    /// Record an entitlement failure.
    pub fn mark_failed(
        &mut self,
        message: impl Into<String>,
        meta: Option<LicensedItemMeta>,
        now: DateTime<Utc>,
    ) {
        self.verified = false;
        self.error_message = message.into();
        if meta.is_some() {
            self.licensed_item_meta = meta;
        }
        self.last_checked_at = Some(now);
    }

    /// Force re-validation on the next trigger.
    pub fn invalidate(&mut self) {
        self.verified = false;
        self.last_checked_at = None;
    }

    /// Current state in the authentication lifecycle.
    pub fn state(&self) -> AuthState {
        if self.verified {
            AuthState::Validated
        } else if self.last_checked_at.is_none() {
            AuthState::Unvalidated
        } else {
            AuthState::Failed
        }
    }

    /// Serialize to the stored JSON form.
    pub fn to_json(&self) -> Result<String, SellergateError> {
        serde_json::to_string(self)
            .map_err(|e| SellergateError::Store(format!("Failed to serialize record: {}", e)))
    }

    /// Deserialize from the stored JSON form.
    pub fn from_json(json: &str) -> Result<Self, SellergateError> {
        serde_json::from_str(json)
            .map_err(|e| SellergateError::Store(format!("Failed to deserialize record: {}", e)))
    }
}
