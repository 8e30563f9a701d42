//! Azure provider configuration (`azure.json`) and what it resolves to.
//!
//! The file is re-read on every request so that credential rotation and key
//! version changes take effect without restarting the plugin.

use std::{fmt, path::Path};

use common::{KeyReference, PluginError};
use serde::Deserialize;

/// Endpoints of one Azure cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AzureCloud {
    pub name: &'static str,
    /// Azure AD authority, with trailing slash.
    pub active_directory_endpoint: &'static str,
    /// DNS suffix appended to the vault name.
    pub key_vault_dns_suffix: &'static str,
    /// Resource identifier tokens must be issued for.
    pub key_vault_resource: &'static str,
}

pub const AZURE_PUBLIC_CLOUD: AzureCloud = AzureCloud {
    name: "AzurePublicCloud",
    active_directory_endpoint: "https://login.microsoftonline.com/",
    key_vault_dns_suffix: "vault.azure.net",
    key_vault_resource: "https://vault.azure.net",
};

pub const AZURE_CHINA_CLOUD: AzureCloud = AzureCloud {
    name: "AzureChinaCloud",
    active_directory_endpoint: "https://login.chinacloudapi.cn/",
    key_vault_dns_suffix: "vault.azure.cn",
    key_vault_resource: "https://vault.azure.cn",
};

pub const AZURE_US_GOVERNMENT_CLOUD: AzureCloud = AzureCloud {
    name: "AzureUSGovernmentCloud",
    active_directory_endpoint: "https://login.microsoftonline.us/",
    key_vault_dns_suffix: "vault.usgovcloudapi.net",
    key_vault_resource: "https://vault.usgovcloudapi.net",
};

pub const AZURE_GERMAN_CLOUD: AzureCloud = AzureCloud {
    name: "AzureGermanCloud",
    active_directory_endpoint: "https://login.microsoftonline.de/",
    key_vault_dns_suffix: "vault.microsoftazure.de",
    key_vault_resource: "https://vault.microsoftazure.de",
};

const CLOUDS: [AzureCloud; 4] = [
    AZURE_PUBLIC_CLOUD,
    AZURE_CHINA_CLOUD,
    AZURE_US_GOVERNMENT_CLOUD,
    AZURE_GERMAN_CLOUD,
];

/// How the plugin authenticates to Azure AD.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Client-credentials grant with an application secret.
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// Instance metadata service; `client_id` selects a user-assigned identity.
    ManagedIdentity { client_id: Option<String> },
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::ServicePrincipal {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
            AuthMode::ManagedIdentity { client_id } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish(),
        }
    }
}

/// Contents of the provider configuration file.
///
/// Every field is optional at parse time; what is actually required depends
/// on the operation and is checked by [`ProviderConfig::key_reference`] and
/// [`ProviderConfig::auth_mode`].
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub cloud: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub aad_client_id: String,
    #[serde(default)]
    pub aad_client_secret: String,
    #[serde(default)]
    pub use_managed_identity_extension: bool,
    #[serde(default, rename = "userAssignedIdentityID")]
    pub user_assigned_identity_id: String,
    #[serde(default)]
    pub provider_vault_name: String,
    #[serde(default)]
    pub provider_key_name: String,
    #[serde(default)]
    pub provider_key_version: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("cloud", &self.cloud)
            .field("tenant_id", &self.tenant_id)
            .field("aad_client_id", &self.aad_client_id)
            .field("aad_client_secret", &"[REDACTED]")
            .field("use_managed_identity_extension", &self.use_managed_identity_extension)
            .field("user_assigned_identity_id", &self.user_assigned_identity_id)
            .field("provider_vault_name", &self.provider_vault_name)
            .field("provider_key_name", &self.provider_key_name)
            .field("provider_key_version", &self.provider_key_version)
            .finish()
    }
}

impl ProviderConfig {
    /// Read and parse the provider configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Config`] if the file cannot be read or is not
    /// valid JSON.
    pub async fn load(path: &Path) -> Result<Self, PluginError> {
        let raw = tokio::fs::read(path).await.map_err(|e| {
            PluginError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
            .map_err(|e| PluginError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// The Azure cloud named by `cloud`. Empty means the public cloud.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Config`] for an unknown cloud name.
    pub fn cloud(&self) -> Result<AzureCloud, PluginError> {
        let name = self.cloud.trim();
        if name.is_empty() {
            return Ok(AZURE_PUBLIC_CLOUD);
        }
        CLOUDS
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .copied()
            .ok_or_else(|| PluginError::Config(format!("unknown cloud: {name}")))
    }

    /// Resolve the key every operation uses.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Config`] naming the first missing field.
    pub fn key_reference(&self) -> Result<KeyReference, PluginError> {
        require(&self.provider_vault_name, "providerVaultName")?;
        require(&self.provider_key_name, "providerKeyName")?;
        require(&self.provider_key_version, "providerKeyVersion")?;
        let cloud = self.cloud()?;
        let vault_base_url = format!(
            "https://{}.{}/",
            self.provider_vault_name.trim(),
            cloud.key_vault_dns_suffix
        );
        KeyReference::new(
            vault_base_url,
            self.provider_key_name.trim(),
            self.provider_key_version.trim(),
        )
    }

    /// Resolve the authentication mode. Service principal unless
    /// `useManagedIdentityExtension` is set.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Config`] if service-principal fields are missing.
    pub fn auth_mode(&self) -> Result<AuthMode, PluginError> {
        if self.use_managed_identity_extension {
            let client_id = Some(self.user_assigned_identity_id.trim())
                .filter(|id| !id.is_empty())
                .map(str::to_owned);
            return Ok(AuthMode::ManagedIdentity { client_id });
        }
        require(&self.tenant_id, "tenantId")?;
        require(&self.aad_client_id, "aadClientId")?;
        require(&self.aad_client_secret, "aadClientSecret")?;
        Ok(AuthMode::ServicePrincipal {
            tenant_id: self.tenant_id.trim().to_owned(),
            client_id: self.aad_client_id.trim().to_owned(),
            client_secret: self.aad_client_secret.clone(),
        })
    }
}

fn require(value: &str, key: &str) -> Result<(), PluginError> {
    if value.trim().is_empty() {
        return Err(PluginError::Config(format!("{key} is required")));
    }
    Ok(())
}
