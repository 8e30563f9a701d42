//! [`KmsService`]: the three-call KMS protocol over Azure Key Vault.
//!
//! The service keeps no state between calls. Each `Encrypt` / `Decrypt`
//! re-reads the provider configuration, resolves the key reference, acquires
//! a credential, and performs exactly one Key Vault operation. Dropping the
//! handler future (client cancel or deadline) drops the in-flight HTTP calls.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use common::{KeyReference, PluginError, PluginIdentity};
use tonic::{Request, Response, Status};
use tracing::{info, info_span, warn, Instrument};

use super::proto::{
    key_management_service_server::KeyManagementService, DecryptRequest, DecryptResponse,
    EncryptRequest, EncryptResponse, VersionRequest, VersionResponse,
};
use super::status::to_status;
use crate::azure::{AzureClients, Credential, ProviderConfig};
use crate::debug::RequestLog;

/// RPC handler for `v1beta1.KeyManagementService`.
#[derive(Clone)]
pub struct KmsService {
    identity: Arc<PluginIdentity>,
    provider_config_path: Arc<PathBuf>,
    clients: AzureClients,
    requests: RequestLog,
}

impl KmsService {
    pub fn new(
        identity: Arc<PluginIdentity>,
        provider_config_path: impl Into<PathBuf>,
        clients: AzureClients,
        requests: RequestLog,
    ) -> Self {
        Self {
            identity,
            provider_config_path: Arc::new(provider_config_path.into()),
            clients,
            requests,
        }
    }

    /// Shared handle to the identity answered on `Version`.
    pub fn identity(&self) -> Arc<PluginIdentity> {
        Arc::clone(&self.identity)
    }

    /// The log every call is recorded in.
    pub fn requests(&self) -> RequestLog {
        self.requests.clone()
    }

    pub fn provider_config_path(&self) -> &Path {
        &self.provider_config_path
    }

    /// Resolve the key and a fresh credential for one operation.
    ///
    /// The key reference is checked before any credential is requested, so an
    /// incomplete configuration never reaches the identity provider.
    async fn resolve(&self) -> Result<(Credential, KeyReference), PluginError> {
        let config = ProviderConfig::load(&self.provider_config_path).await?;
        let key = config.key_reference()?;
        let credential = self.clients.token.credential(&config).await?;
        Ok((credential, key))
    }

    /// Encrypt raw plaintext, returning the backend's ciphertext string as bytes.
    ///
    /// # Errors
    ///
    /// Any [`PluginError`] from resolution or the backend. An empty backend
    /// result is reported as [`PluginError::MalformedResponse`].
    pub async fn encrypt_bytes(&self, plain: &[u8]) -> Result<Vec<u8>, PluginError> {
        let (credential, key) = self.resolve().await?;
        let value = URL_SAFE_NO_PAD.encode(plain);
        let cipher = self
            .clients
            .keyvault
            .encrypt(&credential, &key, &value)
            .await?;
        if cipher.is_empty() {
            return Err(PluginError::MalformedResponse("encrypt result is empty".into()));
        }
        Ok(cipher.into_bytes())
    }

    /// Decrypt opaque ciphertext bytes back to raw plaintext.
    ///
    /// # Errors
    ///
    /// [`PluginError::InvalidRequest`] if `cipher` is not UTF-8 (checked before
    /// any remote call), [`PluginError::MalformedResponse`] if the backend
    /// result is not base64url, or any error from resolution or the backend.
    pub async fn decrypt_bytes(&self, cipher: &[u8]) -> Result<Vec<u8>, PluginError> {
        let cipher = std::str::from_utf8(cipher)
            .map_err(|_| PluginError::InvalidRequest("ciphertext is not valid UTF-8".into()))?;
        let (credential, key) = self.resolve().await?;
        let plain = self
            .clients
            .keyvault
            .decrypt(&credential, &key, cipher)
            .await?;
        URL_SAFE_NO_PAD
            .decode(plain.as_bytes())
            .map_err(|e| PluginError::MalformedResponse(format!("decrypt result is not base64url: {e}")))
    }

    /// Run one RPC body inside a span, then log and record its outcome.
    async fn observe<T, F>(&self, method: &'static str, body: F) -> Result<T, PluginError>
    where
        F: Future<Output = Result<T, PluginError>>,
    {
        let call = self.requests.begin(method);
        let span = info_span!("rpc", method, call_id = %call.id);
        let result = body.instrument(span).await;
        match &result {
            Ok(_) => info!(method, call_id = %call.id, "request processed"),
            Err(e) => warn!(method, call_id = %call.id, kind = e.kind(), error = %e, "request failed"),
        }
        self.requests.finish(call, result.as_ref().err());
        result
    }
}

#[tonic::async_trait]
impl KeyManagementService for KmsService {
    async fn version(
        &self,
        _request: Request<VersionRequest>,
    ) -> Result<Response<VersionResponse>, Status> {
        let call = self.requests.begin("Version");
        let response = VersionResponse {
            version: self.identity.version.clone(),
            runtime_name: self.identity.runtime_name.clone(),
            runtime_version: self.identity.runtime_version.clone(),
        };
        self.requests.finish(call, None);
        Ok(Response::new(response))
    }

    async fn encrypt(
        &self,
        request: Request<EncryptRequest>,
    ) -> Result<Response<EncryptResponse>, Status> {
        let plain = request.into_inner().plain;
        let cipher = self
            .observe("Encrypt", self.encrypt_bytes(&plain))
            .await
            .map_err(|e| to_status(&e))?;
        Ok(Response::new(EncryptResponse { cipher }))
    }

    async fn decrypt(
        &self,
        request: Request<DecryptRequest>,
    ) -> Result<Response<DecryptResponse>, Status> {
        let cipher = request.into_inner().cipher;
        let plain = self
            .observe("Decrypt", self.decrypt_bytes(&cipher))
            .await
            .map_err(|e| to_status(&e))?;
        Ok(Response::new(DecryptResponse { plain }))
    }
}
