//! Shared state injected into every debug handler.

use std::sync::Arc;

use common::PluginIdentity;

use super::trace::RequestLog;

/// State shared across all debug request handlers.
///
/// Both fields are cheaply cloneable so Axum can clone the state per request.
#[derive(Clone, Debug)]
pub struct DebugState {
    /// The identity answered on `Version` calls.
    pub identity: Arc<PluginIdentity>,
    /// Recent RPC outcomes recorded by the KMS service.
    pub requests: RequestLog,
}

impl DebugState {
    pub fn new(identity: Arc<PluginIdentity>, requests: RequestLog) -> Self {
        Self { identity, requests }
    }
}

impl Default for DebugState {
    /// Default identity and an empty log, suitable for tests.
    fn default() -> Self {
        Self::new(Arc::new(PluginIdentity::default()), RequestLog::default())
    }
}
