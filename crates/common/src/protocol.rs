//! JSON bodies served by the debug endpoint.
//!
//! The gRPC messages of the KMS contract are generated from protobuf in the
//! plugin crate; everything here is the side-channel HTTP surface.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request trace
// ---------------------------------------------------------------------------

/// Outcome of a single RPC as seen by the trace log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Error,
}

/// One recorded RPC. Never carries plaintext, ciphertext, or tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Random per-call identifier, also attached to the call's log lines.
    pub id: String,
    /// RPC method name (`Version`, `Encrypt`, `Decrypt`).
    pub method: String,
    /// Wall-clock start, milliseconds since the Unix epoch.
    pub started_at_ms: u64,
    pub duration_ms: u64,
    pub outcome: Outcome,
    /// [`crate::PluginError::kind`] when `outcome` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

/// Response body for `GET /debug/requests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceResponse {
    /// Records, newest first.
    pub requests: Vec<TraceRecord>,
}

// ---------------------------------------------------------------------------
// Health / errors
// ---------------------------------------------------------------------------

/// Response body for `GET /healthz`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"forbidden"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
