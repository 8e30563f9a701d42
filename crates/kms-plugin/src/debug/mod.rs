//! Debug/introspection HTTP endpoint on a separate TCP address.
//!
//! # Routes
//! - `GET /healthz`: liveness.
//! - `GET /debug/version`: plugin identity.
//! - `GET /debug/requests`: recent RPC outcomes (no payloads, no tokens).
//!
//! Access is governed by [`AccessPolicy`]; the default admits loopback peers
//! only.

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
pub mod trace;

pub use middleware::AccessPolicy;
pub use state::DebugState;
pub use trace::RequestLog;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};

/// Bind the debug endpoint and serve it on a background task.
///
/// Binding happens before this returns so that an unusable address fails
/// startup instead of being discovered later.
///
/// # Errors
///
/// Returns an error if `addr` cannot be bound.
pub async fn spawn(addr: SocketAddr, state: DebugState, policy: AccessPolicy) -> Result<JoinHandle<()>> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind debug endpoint on {addr}"))?;
    let local = listener.local_addr().unwrap_or(addr);
    info!(addr = %local, policy = ?policy, "debug endpoint listening");

    let app = router::build(state, policy).into_make_service_with_connect_info::<SocketAddr>();
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "debug endpoint stopped");
        }
    }))
}
