//! Azure client bundle built once at startup.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};

use super::cache::{CachingTokenProvider, DEFAULT_REFRESH_MARGIN};
use super::keyvault::{KeyOperationBackend, KeyVaultClient};
use super::token::{AzureTokenProvider, TokenProvider};

/// How Azure AD credentials are obtained and reused.
#[derive(Debug, Clone)]
pub struct TokenOptions {
    /// Reuse credentials across requests.
    pub cache: bool,
    /// Remaining lifetime below which a cached credential is refreshed.
    pub refresh_margin: Duration,
    /// Azure AD authority replacing the cloud's default.
    pub authority: Option<String>,
    /// Managed identity token endpoint replacing the IMDS default.
    pub imds_endpoint: Option<String>,
}

impl Default for TokenOptions {
    fn default() -> Self {
        Self {
            cache: false,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            authority: None,
            imds_endpoint: None,
        }
    }
}

/// Token provider and key operation backend used by the KMS service.
///
/// Both share one `reqwest` connection pool. Credentials themselves are not
/// shared unless the cache is enabled.
#[derive(Clone)]
pub struct AzureClients {
    pub token: Arc<dyn TokenProvider>,
    pub keyvault: Arc<dyn KeyOperationBackend>,
}

impl AzureClients {
    /// Build the HTTP client and both collaborators.
    ///
    /// `timeout` bounds every Azure AD and Key Vault request, so a hung
    /// remote call cannot outlive the RPC that started it.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS-backed HTTP client cannot be constructed.
    pub fn init(timeout: Duration, options: &TokenOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(concat!("azure-kms-plugin/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        let mut provider = AzureTokenProvider::new(http.clone());
        if let Some(authority) = &options.authority {
            provider = provider.with_authority(authority.as_str());
        }
        if let Some(endpoint) = &options.imds_endpoint {
            provider = provider.with_imds_endpoint(endpoint.as_str());
        }
        let token: Arc<dyn TokenProvider> = if options.cache {
            Arc::new(CachingTokenProvider::with_margin(provider, options.refresh_margin))
        } else {
            Arc::new(provider)
        };

        Ok(Self {
            token,
            keyvault: Arc::new(KeyVaultClient::new(http)),
        })
    }

    /// Bundle arbitrary implementations, e.g. test doubles.
    pub fn new(token: Arc<dyn TokenProvider>, keyvault: Arc<dyn KeyOperationBackend>) -> Self {
        Self { token, keyvault }
    }
}
