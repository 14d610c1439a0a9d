//! Authenticate request/response structs and update-server error parsing.

use crate::config::EnvironmentFingerprint;
use crate::SellergateError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Version reported to providers as `authLibVersion`.
pub const AUTH_LIB_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Usage terms category for items whose runtime use is tied to a domain.
pub const RESTRICTED_USAGE_BY_DOMAIN: &str = "restricted_usage_by_domain";

/// `type` tag the update server puts on its JSON error bodies.
pub const UPDATE_API_ERROR_TYPE: &str = "WCEXCPTM_API_ERROR";

/// Diagnostic payload posted to `<endpoint>/authenticate/<productId>`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest<'a> {
    pub domain: &'a str,
    pub auth_lib_version: &'a str,
    pub product_version: &'a str,
    pub host_platform_version: &'a str,
    pub runtime_version: &'a str,
    #[serde(flatten)]
    pub diagnostics: &'a BTreeMap<String, String>,
}

impl<'a> AuthRequest<'a> {
    /// Build the payload from the install's domain and fingerprint.
    pub fn new(
        domain: &'a str,
        product_version: &'a str,
        fingerprint: &'a EnvironmentFingerprint,
    ) -> Self {
        Self {
            domain,
            auth_lib_version: AUTH_LIB_VERSION,
            product_version,
            host_platform_version: &fingerprint.host_platform_version,
            runtime_version: &fingerprint.runtime_version,
            diagnostics: &fingerprint.diagnostics,
        }
    }

    /// Serialize to a JSON body.
    pub fn to_body(&self) -> Result<Vec<u8>, SellergateError> {
        serde_json::to_vec(self)
            .map_err(|e| SellergateError::Protocol(format!("Failed to serialize payload: {}", e)))
    }
}

/// Terms-of-use metadata for the licensed item.
///
/// Only `usageTermsCategory` drives behavior; everything else the provider
/// sends is kept verbatim in `extra`, whatever its type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicensedItemMeta {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub usage_terms_category: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Scalars become their string form; null, arrays and objects become `None`.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

impl LicensedItemMeta {
    /// Meta with only a usage terms category.
    pub fn with_usage_terms(category: impl Into<String>) -> Self {
        Self {
            usage_terms_category: Some(category.into()),
            ..Self::default()
        }
    }

    /// Whether a failed check blocks runtime usage (as opposed to updates only).
    pub fn restricts_usage(&self) -> bool {
        self.usage_terms_category.as_deref() == Some(RESTRICTED_USAGE_BY_DOMAIN)
    }
}

/// Verdict field of a well-formed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    Success,
    Error,
}

/// A well-formed authenticate response.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResponse {
    pub result: AuthResult,
    /// `error.message`, when present and non-empty.
    pub error_message: Option<String>,
    pub licensed_item_meta: Option<LicensedItemMeta>,
}

/// Parse an authenticate response body.
///
/// Returns `ProtocolError` when the body is not a JSON object or `result` is
/// neither `"success"` nor `"error"`. Item metadata is read from
/// `licensedItemMeta`, falling back to the legacy `cptItem` key; a value that
/// is not an object is ignored.
pub fn parse_auth_response(body: &[u8]) -> Result<AuthResponse, SellergateError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SellergateError::Protocol(format!("Response is not JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| SellergateError::Protocol("Response is not a JSON object".to_string()))?;

    let result = match object.get("result").and_then(Value::as_str) {
        Some("success") => AuthResult::Success,
        Some("error") => AuthResult::Error,
        other => {
            return Err(SellergateError::Protocol(format!(
                "Unrecognized result field: {:?}",
                other
            )))
        }
    };

    let error_message = object
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from);

    let licensed_item_meta = object
        .get("licensedItemMeta")
        .filter(|v| v.is_object())
        .or_else(|| object.get("cptItem").filter(|v| v.is_object()))
        .and_then(|v| match serde_json::from_value(v.clone()) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!(error = %e, "licensed item meta unreadable, ignoring");
                None
            }
        });

    Ok(AuthResponse {
        result,
        error_message,
        licensed_item_meta,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateApiError {
    #[serde(rename = "type")]
    error_type: String,
    cpt_item: UpdateApiItem,
    error: UpdateApiErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateApiItem {
    item_unique_id: String,
}

#[derive(Debug, Deserialize)]
struct UpdateApiErrorBody {
    message: String,
}

/// Extract this product's message from an update-server error body.
///
/// Hosts use this to replace the generic "file not found" error they show
/// when an update download is refused.
pub fn update_error_message(product_id: &str, body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    let parsed: UpdateApiError = serde_json::from_str(body).ok()?;
    if parsed.error_type != UPDATE_API_ERROR_TYPE {
        return None;
    }
    if parsed.cpt_item.item_unique_id != product_id {
        return None;
    }
    Some(parsed.error.message).filter(|m| !m.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_payload_shape() {
        let fingerprint = EnvironmentFingerprint::new("6.4.2", "8.2.0")
            .with_diagnostic("webServer", "nginx/1.25");
        let request = AuthRequest::new("shop.example.com", "2.1.0", &fingerprint);
        let body: Value = serde_json::from_slice(&request.to_body().unwrap()).unwrap();

        assert_eq!(body["domain"], "shop.example.com");
        assert_eq!(body["authLibVersion"], AUTH_LIB_VERSION);
        assert_eq!(body["productVersion"], "2.1.0");
        assert_eq!(body["hostPlatformVersion"], "6.4.2");
        assert_eq!(body["runtimeVersion"], "8.2.0");
        assert_eq!(body["webServer"], "nginx/1.25");
    }

    #[test]
    fn test_parse_success_with_meta() {
        let body = br#"{"result":"success","licensedItemMeta":{"usageTermsCategory":"unrestricted","itemUniqueId":"widget","plan":"pro"}}"#;
        let response = parse_auth_response(body).unwrap();

        assert_eq!(response.result, AuthResult::Success);
        let meta = response.licensed_item_meta.unwrap();
        assert_eq!(meta.usage_terms_category.as_deref(), Some("unrestricted"));
        assert_eq!(meta.extra["itemUniqueId"], "widget");
        assert_eq!(meta.extra["plan"], "pro");
        assert!(!meta.restricts_usage());
    }

    #[test]
    fn test_parse_error_with_message() {
        let body = br#"{"result":"error","error":{"message":"domain mismatch"}}"#;
        let response = parse_auth_response(body).unwrap();

        assert_eq!(response.result, AuthResult::Error);
        assert_eq!(response.error_message.as_deref(), Some("domain mismatch"));
        assert!(response.licensed_item_meta.is_none());
    }

    #[test]
    fn test_parse_error_without_message() {
        let response = parse_auth_response(br#"{"result":"error","error":null}"#).unwrap();
        assert_eq!(response.result, AuthResult::Error);
        assert!(response.error_message.is_none());
    }

    #[test]
    fn test_parse_legacy_item_key() {
        let body = br#"{"result":"error","error":{"message":"x"},"cptItem":{"usageTermsCategory":"restricted_usage_by_domain"}}"#;
        let response = parse_auth_response(body).unwrap();
        assert!(response.licensed_item_meta.unwrap().restricts_usage());
    }

    #[test]
    fn test_parse_meta_with_loose_field_types() {
        let body = br#"{"result":"error","error":{"message":"domain mismatch"},"licensedItemMeta":{"usageTermsCategory":"restricted_usage_by_domain","itemUniqueId":42}}"#;
        let meta = parse_auth_response(body).unwrap().licensed_item_meta.unwrap();
        assert!(meta.restricts_usage());
        assert_eq!(meta.extra["itemUniqueId"], 42);

        let numeric = br#"{"result":"success","licensedItemMeta":{"usageTermsCategory":7,"tags":["a"]}}"#;
        let meta = parse_auth_response(numeric).unwrap().licensed_item_meta.unwrap();
        assert_eq!(meta.usage_terms_category.as_deref(), Some("7"));
        assert!(!meta.restricts_usage());

        let nested = br#"{"result":"success","licensedItemMeta":{"usageTermsCategory":{"k":1}}}"#;
        let meta = parse_auth_response(nested).unwrap().licensed_item_meta.unwrap();
        assert!(meta.usage_terms_category.is_none());
    }

    #[test]
    fn test_meta_round_trips_through_storage_json() {
        let meta: LicensedItemMeta = serde_json::from_str(
            r#"{"usageTermsCategory":"restricted_usage_by_domain","itemUniqueId":42}"#,
        )
        .unwrap();
        let stored = serde_json::to_string(&meta).unwrap();
        assert_eq!(serde_json::from_str::<LicensedItemMeta>(&stored).unwrap(), meta);
    }

    #[test]
    fn test_parse_ignores_non_object_meta() {
        let response =
            parse_auth_response(br#"{"result":"success","licensedItemMeta":"nope"}"#).unwrap();
        assert!(response.licensed_item_meta.is_none());
    }

    #[test]
    fn test_parse_rejects_ambiguous_bodies() {
        for body in [
            &b"not json"[..],
            &b"[1,2,3]"[..],
            &b"\"success\""[..],
            &br#"{"result":"maybe"}"#[..],
            &br#"{"status":"ok"}"#[..],
        ] {
            assert!(
                matches!(parse_auth_response(body), Err(SellergateError::Protocol(_))),
                "expected protocol error for {:?}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_update_error_message_matches_product() {
        let body = r#"{"type":"WCEXCPTM_API_ERROR","cptItem":{"itemUniqueId":"widget"},"error":{"message":"Updates require an active subscription"}}"#;
        assert_eq!(
            update_error_message("widget", body).as_deref(),
            Some("Updates require an active subscription")
        );
        assert!(update_error_message("gadget", body).is_none());
    }

    #[test]
    fn test_update_error_message_ignores_other_bodies() {
        assert!(update_error_message("widget", "").is_none());
        assert!(update_error_message("widget", "<html>").is_none());
        let other = r#"{"type":"OTHER","cptItem":{"itemUniqueId":"widget"},"error":{"message":"m"}}"#;
        assert!(update_error_message("widget", other).is_none());
    }
}
