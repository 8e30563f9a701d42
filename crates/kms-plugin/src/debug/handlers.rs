//! Axum request handlers for the debug endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use common::{
    protocol::{ErrorResponse, HealthResponse, TraceResponse},
    PluginIdentity,
};

use super::state::DebugState;

/// `GET /healthz`: the process is up and serving.
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

/// `GET /debug/version`: the identity answered on `Version` calls.
pub async fn version(State(state): State<DebugState>) -> Json<PluginIdentity> {
    Json(state.identity.as_ref().clone())
}

/// `GET /debug/requests`: recent RPC outcomes, newest first.
pub async fn requests(State(state): State<DebugState>) -> Json<TraceResponse> {
    Json(TraceResponse {
        requests: state.requests.recent(),
    })
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
