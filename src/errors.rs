//! Sellergate error types.

use thiserror::Error;

/// Errors that can occur while configuring or driving entitlement checks.
///
/// Transport and protocol failures never reach the host: the validator
/// absorbs them (fail-open). Store failures surface from initialization and
/// record snapshots, and are logged everywhere else.
#[derive(Debug, Error)]
pub enum SellergateError {
    /// Provider catalog or product configuration is invalid.
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// Requested provider is not in the configured allow-list.
    #[error("Invalid provider: '{provider}' is not an allowed seller")]
    InvalidProvider {
        /// The rejected provider name.
        provider: String,
    },

    /// HTTP transport error talking to the provider.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response or payload could not be encoded/decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Persistence collaborator failed.
    #[error("Store error: {0}")]
    Store(String),
}
