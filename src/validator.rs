//! One remote entitlement check, normalized to a [`ValidationOutcome`].
//!
//! Fail-open policy: when no trustworthy verdict can be obtained (transport
//! error, malformed or unrecognized body) the outcome is `Success` without
//! item metadata. Only a well-formed `"error"` response produces `Failure`.
//! There are no retries here; the scheduler's cadence is the retry loop.

use crate::client::{HttpResponse, HttpTransport};
use crate::config::EnvironmentFingerprint;
use crate::protocol::{parse_auth_response, AuthRequest, AuthResult, LicensedItemMeta};
use crate::provider::ResolvedEndpoint;
use crate::SellergateError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a single validation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Entitled, or no trustworthy verdict was obtained.
    Success {
        /// Terms-of-use metadata, when the provider sent it.
        licensed_item_meta: Option<LicensedItemMeta>,
    },
    /// The provider reported that this install is not entitled.
    Failure {
        /// Human-readable reason.
        message: String,
        /// Terms-of-use metadata, when the provider sent it.
        licensed_item_meta: Option<LicensedItemMeta>,
    },
}

impl ValidationOutcome {
    /// Fail-open outcome.
    pub fn fail_open() -> Self {
        ValidationOutcome::Success {
            licensed_item_meta: None,
        }
    }

    /// Whether this outcome grants entitlement.
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationOutcome::Success { .. })
    }
}

/// Inputs for one validation attempt.
#[derive(Debug, Clone, Copy)]
pub struct ValidationRequest<'a> {
    pub product_id: &'a str,
    pub product_version: &'a str,
    pub endpoint: &'a ResolvedEndpoint,
    /// Domain of this install.
    pub host: &'a str,
    pub fingerprint: &'a EnvironmentFingerprint,
}

/// Performs a validation attempt.
pub trait Validator: Send + Sync {
    /// Run exactly one check. Never fails: every error is folded into the outcome.
    fn validate(&self, request: &ValidationRequest<'_>) -> ValidationOutcome;
}

/// Validator that asks the provider over HTTP.
pub struct RemoteValidator {
    transport: Arc<dyn HttpTransport>,
}

impl RemoteValidator {
    /// Validator over a transport.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

impl Validator for RemoteValidator {
    fn validate(&self, request: &ValidationRequest<'_>) -> ValidationOutcome {
        let url = authenticate_url(&request.endpoint.endpoint, request.product_id);
        let body = match AuthRequest::new(request.host, request.product_version, request.fingerprint)
            .to_body()
        {
            Ok(body) => body,
            Err(e) => {
                warn!(product_id = request.product_id, error = %e, "payload encoding failed, failing open");
                return ValidationOutcome::fail_open();
            }
        };

        debug!(
            product_id = request.product_id,
            provider = %request.endpoint.provider,
            url = %url,
            "sending authenticate request"
        );

        let headers = [("content-type", "application/json"), ("referer", request.host)];
        let response = self.transport.post_json(&url, &headers, &body);
        interpret_response(request.product_id, &request.endpoint.provider, response)
    }
}

/// `<endpoint>/authenticate/<productId>`, with trailing slashes trimmed.
pub fn authenticate_url(endpoint: &str, product_id: &str) -> String {
    format!("{}/authenticate/{}", endpoint.trim_end_matches('/'), product_id)
}

/// Metadata URL the host's update checker polls for new releases.
///
/// # Errors
/// `InvalidConfiguration` if `endpoint` is not an absolute URL.
pub fn update_metadata_url(endpoint: &str, product_id: &str, host: &str) -> Result<String, SellergateError> {
    let base = format!("{}/wp-update-server/", endpoint.trim_end_matches('/'));
    let url = url::Url::parse_with_params(
        &base,
        &[
            ("wcexcptm_update_action", "get_metadata"),
            ("wcexcptm_cptitem_unique_id", product_id),
            ("domain", host),
        ],
    )
    .map_err(|e| SellergateError::InvalidConfiguration(format!("update endpoint {}: {}", endpoint, e)))?;
    Ok(url.into())
}

/// Message used when an error response carries none.
pub fn generic_failure_message(provider: &str) -> String {
    format!("There was a problem reaching the {} server", provider)
}

/// Map a transport result onto an outcome, applying the fail-open policy.
pub fn interpret_response(
    product_id: &str,
    provider: &str,
    response: Result<HttpResponse, SellergateError>,
) -> ValidationOutcome {
    let response = match response {
        Ok(response) => response,
        Err(e) => {
            warn!(product_id, provider, error = %e, "provider unreachable, failing open");
            return ValidationOutcome::fail_open();
        }
    };

    let parsed = match parse_auth_response(&response.body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(
                product_id,
                provider,
                status = response.status,
                error = %e,
                "ambiguous response, failing open"
            );
            debug!(
                product_id,
                body = response.body_str().unwrap_or("<non-utf8 body>"),
                "ambiguous response body"
            );
            return ValidationOutcome::fail_open();
        }
    };

    match parsed.result {
        AuthResult::Error => ValidationOutcome::Failure {
            message: parsed
                .error_message
                .unwrap_or_else(|| generic_failure_message(provider)),
            licensed_item_meta: parsed.licensed_item_meta,
        },
        AuthResult::Success if response.is_success() => ValidationOutcome::Success {
            licensed_item_meta: parsed.licensed_item_meta,
        },
        AuthResult::Success => {
            warn!(
                product_id,
                provider,
                status = response.status,
                "success body with error status, failing open"
            );
            ValidationOutcome::fail_open()
        }
    }
}
