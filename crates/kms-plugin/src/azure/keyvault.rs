//! Key Vault key operations (`encrypt` / `decrypt`) over REST.
//!
//! Values crossing this boundary are already base64url (no padding) strings;
//! encoding the protocol's raw bytes is the caller's job. The algorithm is
//! fixed at build time.

use async_trait::async_trait;
use common::{KeyReference, PluginError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::token::Credential;

/// RSA-PKCS1 v1.5, the only algorithm this plugin uses.
pub const ALGORITHM: &str = "RSA1_5";

/// Key Vault data-plane API version.
pub const API_VERSION: &str = "2016-10-01";

/// The remote key operation backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyOperationBackend: Send + Sync {
    /// Encrypt a base64url `value` with `key`, returning the backend's result string.
    ///
    /// # Errors
    ///
    /// [`PluginError::RemoteOperation`] if the call fails,
    /// [`PluginError::MalformedResponse`] if the result is unusable.
    async fn encrypt(
        &self,
        credential: &Credential,
        key: &KeyReference,
        value: &str,
    ) -> Result<String, PluginError>;

    /// Decrypt a backend ciphertext string, returning the base64url plaintext.
    ///
    /// # Errors
    ///
    /// Same as [`KeyOperationBackend::encrypt`].
    async fn decrypt(
        &self,
        credential: &Credential,
        key: &KeyReference,
        value: &str,
    ) -> Result<String, PluginError>;
}

#[derive(Serialize)]
struct KeyOperationsParameters<'a> {
    alg: &'a str,
    value: &'a str,
}

#[derive(Deserialize)]
struct KeyOperationResult {
    kid: Option<String>,
    value: Option<String>,
}

#[derive(Deserialize)]
struct KeyVaultErrorBody {
    error: Option<KeyVaultError>,
}

#[derive(Deserialize)]
struct KeyVaultError {
    code: Option<String>,
    message: Option<String>,
}

/// [`KeyOperationBackend`] backed by the Azure Key Vault REST API.
#[derive(Clone, Debug)]
pub struct KeyVaultClient {
    http: reqwest::Client,
}

impl KeyVaultClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn key_operation(
        &self,
        operation: &'static str,
        credential: &Credential,
        key: &KeyReference,
        value: &str,
    ) -> Result<String, PluginError> {
        let url = key.operation_url(operation);
        debug!(operation, key_name = %key.key_name, key_version = %key.key_version, "key vault request");

        let resp = self
            .http
            .post(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(credential.bearer())
            .json(&KeyOperationsParameters {
                alg: ALGORITHM,
                value,
            })
            .send()
            .await
            .map_err(|e| PluginError::RemoteOperation(format!("failed to {operation}: {e}")))?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| {
            PluginError::RemoteOperation(format!("failed to read {operation} response: {e}"))
        })?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<KeyVaultErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .map(|e| {
                    format!(
                        "{}: {}",
                        e.code.unwrap_or_default(),
                        e.message.unwrap_or_default()
                    )
                })
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(PluginError::RemoteOperation(format!(
                "failed to {operation}, key vault returned {status}: {detail}"
            )));
        }

        let result: KeyOperationResult = serde_json::from_slice(&body).map_err(|e| {
            PluginError::MalformedResponse(format!("{operation} result is not valid JSON: {e}"))
        })?;
        debug!(operation, kid = result.kid.as_deref().unwrap_or_default(), "key vault operation complete");
        result
            .value
            .ok_or_else(|| PluginError::MalformedResponse(format!("{operation} result has no value")))
    }
}

#[async_trait]
impl KeyOperationBackend for KeyVaultClient {
    async fn encrypt(
        &self,
        credential: &Credential,
        key: &KeyReference,
        value: &str,
    ) -> Result<String, PluginError> {
        self.key_operation("encrypt", credential, key, value).await
    }

    async fn decrypt(
        &self,
        credential: &Credential,
        key: &KeyReference,
        value: &str,
    ) -> Result<String, PluginError> {
        self.key_operation("decrypt", credential, key, value).await
    }
}
