//! Access control and limits for the debug endpoint.
//!
//! The endpoint exposes operational detail about key operations, so it is
//! loopback-only unless the operator explicitly opens it.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::ErrorResponse;
use tracing::warn;

/// Per-request timeout applied to all debug routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Who may reach the debug endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Only peers on a loopback address.
    LoopbackOnly,
    /// Any peer that can reach the listen address.
    Any,
    /// The endpoint is not started at all.
    Disabled,
}

impl FromStr for AccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loopback" => Ok(AccessPolicy::LoopbackOnly),
            "any" => Ok(AccessPolicy::Any),
            "disabled" => Ok(AccessPolicy::Disabled),
            other => Err(format!(
                "unknown access policy {other:?} (expected loopback, any or disabled)"
            )),
        }
    }
}

impl AccessPolicy {
    /// Whether a request from `peer` is allowed. `None` means the peer is unknown.
    pub fn allows(&self, peer: Option<SocketAddr>) -> bool {
        match self {
            AccessPolicy::Any => true,
            AccessPolicy::LoopbackOnly => peer.is_some_and(|p| p.ip().is_loopback()),
            AccessPolicy::Disabled => false,
        }
    }
}

/// Reject requests the policy does not allow with `403 Forbidden`.
///
/// The peer comes from the `ConnectInfo` extractor, which also honours
/// `MockConnectInfo`.
pub async fn enforce_access(
    State(policy): State<AccessPolicy>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    if !policy.allows(peer) {
        warn!(peer = ?peer, "debug endpoint request denied");
        let err = ErrorResponse::new("forbidden", "debug endpoint access denied");
        return (StatusCode::FORBIDDEN, Json(err)).into_response();
    }
    next.run(request).await
}
