//! Test doubles shared by the service and server tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use common::{KeyReference, PluginError};
use tempfile::TempDir;

use crate::azure::{Credential, KeyOperationBackend, ProviderConfig, TokenProvider};

pub const PROVIDER_JSON: &str = r#"{
    "tenantId": "tenant",
    "aadClientId": "client",
    "aadClientSecret": "secret",
    "providerVaultName": "k8svault",
    "providerKeyName": "k8s",
    "providerKeyVersion": "v1"
}"#;

/// A provider config file inside a temp dir that lives as long as the value.
pub struct ProviderFile {
    _dir: TempDir,
    path: PathBuf,
}

impl ProviderFile {
    pub fn new(contents: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("azure.json");
        std::fs::write(&path, contents).unwrap();
        Self { _dir: dir, path }
    }

    pub fn valid() -> Self {
        Self::new(PROVIDER_JSON)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Always hands out the same credential.
pub struct StaticToken;

#[async_trait]
impl TokenProvider for StaticToken {
    async fn credential(&self, _config: &ProviderConfig) -> Result<Credential, PluginError> {
        Ok(Credential::new("test-token", None))
    }
}

/// Reversible fake vault: the "ciphertext" is the base64url of the reversed
/// input string, so distinct inputs give distinct outputs.
pub struct ReversingVault;

#[async_trait]
impl KeyOperationBackend for ReversingVault {
    async fn encrypt(
        &self,
        _credential: &Credential,
        _key: &KeyReference,
        value: &str,
    ) -> Result<String, PluginError> {
        let reversed: String = value.chars().rev().collect();
        Ok(URL_SAFE_NO_PAD.encode(reversed))
    }

    async fn decrypt(
        &self,
        _credential: &Credential,
        _key: &KeyReference,
        value: &str,
    ) -> Result<String, PluginError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| PluginError::RemoteOperation(format!("bad ciphertext: {e}")))?;
        let reversed = String::from_utf8(bytes)
            .map_err(|e| PluginError::RemoteOperation(format!("bad ciphertext: {e}")))?;
        Ok(reversed.chars().rev().collect())
    }
}
