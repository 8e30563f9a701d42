//! The identity triple answered on every `Version` call.

use serde::{Deserialize, Serialize};

/// KMS API version spoken by this plugin.
pub const DEFAULT_VERSION: &str = "v1beta1";

/// Runtime name reported to the API server.
pub const DEFAULT_RUNTIME_NAME: &str = "Microsoft AzureKMS";

/// Runtime version reported to the API server.
pub const DEFAULT_RUNTIME_VERSION: &str = "0.0.1";

/// Plugin identity, built once at startup and shared read-only.
///
/// `version` is compared by the caller with plain string equality; the plugin
/// performs no negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginIdentity {
    pub version: String,
    pub runtime_name: String,
    pub runtime_version: String,
}

impl PluginIdentity {
    pub fn new(
        version: impl Into<String>,
        runtime_name: impl Into<String>,
        runtime_version: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            runtime_name: runtime_name.into(),
            runtime_version: runtime_version.into(),
        }
    }
}

impl Default for PluginIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION, DEFAULT_RUNTIME_NAME, DEFAULT_RUNTIME_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_identity() {
        let id = PluginIdentity::default();
        assert_eq!(id.version, "v1beta1");
        assert_eq!(id.runtime_name, "Microsoft AzureKMS");
        assert_eq!(id.runtime_version, "0.0.1");
    }
}
