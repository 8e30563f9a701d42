//! Common error types shared across crates.

use thiserror::Error;

/// Per-request plugin error.
///
/// Every variant is recoverable: it fails the single RPC that produced it and
/// never the process. Variants map to gRPC status codes returned to the API
/// server:
/// - [`PluginError::Config`] → `FAILED_PRECONDITION`
/// - [`PluginError::Auth`] → `UNAUTHENTICATED`
/// - [`PluginError::RemoteOperation`] → `UNAVAILABLE`
/// - [`PluginError::MalformedResponse`] → `INTERNAL`
/// - [`PluginError::InvalidRequest`] → `INVALID_ARGUMENT`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PluginError {
    /// The key reference or auth mode could not be resolved from the provider
    /// configuration file.
    #[error("configuration error: {0}")]
    Config(String),

    /// The identity provider rejected the request or could not be reached.
    #[error("failed to get token: {0}")]
    Auth(String),

    /// The remote key operation failed.
    #[error("key operation failed: {0}")]
    RemoteOperation(String),

    /// The remote key operation succeeded but its result could not be used.
    #[error("malformed key operation response: {0}")]
    MalformedResponse(String),

    /// The request payload itself is unusable (e.g. ciphertext that is not UTF-8).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl PluginError {
    /// Short machine-readable error kind, safe for logs and trace records.
    pub fn kind(&self) -> &'static str {
        match self {
            PluginError::Config(_) => "config_error",
            PluginError::Auth(_) => "auth_error",
            PluginError::RemoteOperation(_) => "remote_operation_error",
            PluginError::MalformedResponse(_) => "malformed_response",
            PluginError::InvalidRequest(_) => "invalid_request",
        }
    }
}
