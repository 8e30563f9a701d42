//! Mapping from [`PluginError`] to gRPC [`Status`].

use common::PluginError;
use tonic::{Code, Status};

/// The gRPC code reported for each error class.
pub fn code_for(err: &PluginError) -> Code {
    match err {
        PluginError::Config(_) => Code::FailedPrecondition,
        PluginError::Auth(_) => Code::Unauthenticated,
        PluginError::RemoteOperation(_) => Code::Unavailable,
        PluginError::MalformedResponse(_) => Code::Internal,
        PluginError::InvalidRequest(_) => Code::InvalidArgument,
    }
}

/// Convert a per-request error into the status returned to the API server.
pub fn to_status(err: &PluginError) -> Status {
    Status::new(code_for(err), err.to_string())
}
