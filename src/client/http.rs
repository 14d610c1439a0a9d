//! HTTP transport capability and its reqwest implementation.
//!
//! The core never opens sockets itself; it only calls
//! [`HttpTransport::post_json`]. [`ReqwestTransport`] is the default
//! implementation used by hosts that don't bring their own client.

use crate::config::{ProductConfig, HTTP_TIMEOUT};
use crate::SellergateError;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::time::Duration;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get the body as a UTF-8 string.
    pub fn body_str(&self) -> Result<&str, SellergateError> {
        std::str::from_utf8(&self.body)
            .map_err(|e| SellergateError::Protocol(format!("Invalid UTF-8 in body: {}", e)))
    }
}

/// Outbound HTTP capability.
pub trait HttpTransport: Send + Sync {
    /// POST a JSON body.
    ///
    /// Returns `Transport` when no response was received at all; any
    /// received status (including 4xx/5xx) is an `Ok` response.
    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, SellergateError>;
}

/// Blocking reqwest transport.
pub struct ReqwestTransport {
    client: Client,
    user_agent: String,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport identifying itself as the given product.
    pub fn new(product: &ProductConfig) -> Result<Self, SellergateError> {
        Ok(Self {
            client: build_client(HTTP_TIMEOUT)?,
            user_agent: build_user_agent(product),
            timeout: HTTP_TIMEOUT,
        })
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, SellergateError> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// User-Agent sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, SellergateError> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SellergateError::Transport(format!("Invalid header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SellergateError::Transport(format!("Invalid header value: {}", e)))?;
            header_map.insert(name, value);
        }

        let response = self
            .client
            .post(url)
            .header(USER_AGENT, &self.user_agent)
            .headers(header_map)
            .body(body.to_vec())
            .send()
            .map_err(|e| SellergateError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| SellergateError::Transport(format!("Failed to read body: {}", e)))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}

fn build_client(timeout: Duration) -> Result<Client, SellergateError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SellergateError::Transport(format!("Failed to build HTTP client: {}", e)))
}

/// Build a User-Agent string from config.
///
/// Format: `sellergate/<version> <product>/<product_version>`
pub fn build_user_agent(product: &ProductConfig) -> String {
    format!(
        "sellergate/{} {}/{}",
        env!("CARGO_PKG_VERSION"),
        product.product_id,
        product.product_version
    )
}
