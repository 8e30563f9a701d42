//! Azure AD access tokens for the Key Vault resource.
//!
//! A token is requested per logical operation; nothing is retried here. The
//! optional [`super::cache::CachingTokenProvider`] decorator can sit in front
//! of any [`TokenProvider`].

use std::{
    fmt,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use common::PluginError;
use serde::Deserialize;
use tracing::debug;

use super::provider::{AuthMode, ProviderConfig};

/// Default instance metadata token endpoint for managed identities.
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IMDS_API_VERSION: &str = "2018-02-01";

/// An opaque, time-limited bearer token.
#[derive(Clone)]
pub struct Credential {
    token: String,
    expires_at: Option<Instant>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_in: Option<Duration>) -> Self {
        Self {
            token: token.into(),
            expires_at: expires_in.map(|d| Instant::now() + d),
        }
    }

    /// The raw token for an `Authorization: Bearer` header.
    pub fn bearer(&self) -> &str {
        &self.token
    }

    /// `true` if the token stays valid for at least `margin` from now.
    /// Tokens without a known expiry are never considered fresh.
    pub fn valid_for(&self, margin: Duration) -> bool {
        self.expires_at
            .is_some_and(|at| at.saturating_duration_since(Instant::now()) > margin)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the token, not even in debug builds.
        f.write_str("Credential([REDACTED])")
    }
}

/// Source of credentials for the key operation backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a credential for the auth mode described by `config`.
    ///
    /// # Errors
    ///
    /// [`PluginError::Config`] if the auth mode cannot be resolved,
    /// [`PluginError::Auth`] if the identity provider rejects the request or
    /// cannot be reached.
    async fn credential(&self, config: &ProviderConfig) -> Result<Credential, PluginError>;
}

/// Token endpoint response, shared by Azure AD and IMDS.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<Seconds>,
}

/// `expires_in` is a string on the v1 endpoint and IMDS, a number elsewhere.
#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(u64),
    Text(String),
}

impl Seconds {
    fn as_duration(&self) -> Option<Duration> {
        match self {
            Seconds::Number(n) => Some(Duration::from_secs(*n)),
            Seconds::Text(s) => s.trim().parse().ok().map(Duration::from_secs),
        }
    }
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// [`TokenProvider`] talking to Azure AD or the instance metadata service.
#[derive(Clone, Debug)]
pub struct AzureTokenProvider {
    http: reqwest::Client,
    /// Overrides the cloud's Azure AD authority when set.
    authority: Option<String>,
    imds_endpoint: String,
}

impl AzureTokenProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            authority: None,
            imds_endpoint: IMDS_TOKEN_ENDPOINT.into(),
        }
    }

    /// Use `authority` instead of the cloud's Azure AD endpoint.
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    /// Use `endpoint` instead of the default IMDS token endpoint.
    pub fn with_imds_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.imds_endpoint = endpoint.into();
        self
    }

    async fn service_principal(
        &self,
        authority: &str,
        resource: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Credential, PluginError> {
        let url = format!("{}/{}/oauth2/token", authority.trim_end_matches('/'), tenant_id);
        debug!(%url, client_id, "requesting service principal token");
        let resp = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("resource", resource),
            ])
            .send()
            .await
            .map_err(|e| PluginError::Auth(format!("token request to {url} failed: {e}")))?;
        parse_token_response(resp).await
    }

    async fn managed_identity(
        &self,
        resource: &str,
        client_id: Option<&str>,
    ) -> Result<Credential, PluginError> {
        debug!(endpoint = %self.imds_endpoint, client_id, "requesting managed identity token");
        let mut query = vec![("api-version", IMDS_API_VERSION), ("resource", resource)];
        if let Some(id) = client_id {
            query.push(("client_id", id));
        }
        let resp = self
            .http
            .get(&self.imds_endpoint)
            .header("Metadata", "true")
            .query(&query)
            .send()
            .await
            .map_err(|e| PluginError::Auth(format!("managed identity token request failed: {e}")))?;
        parse_token_response(resp).await
    }
}

#[async_trait]
impl TokenProvider for AzureTokenProvider {
    async fn credential(&self, config: &ProviderConfig) -> Result<Credential, PluginError> {
        let cloud = config.cloud()?;
        match config.auth_mode()? {
            AuthMode::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            } => {
                let authority = self
                    .authority
                    .as_deref()
                    .unwrap_or(cloud.active_directory_endpoint);
                self.service_principal(
                    authority,
                    cloud.key_vault_resource,
                    &tenant_id,
                    &client_id,
                    &client_secret,
                )
                .await
            }
            AuthMode::ManagedIdentity { client_id } => {
                self.managed_identity(cloud.key_vault_resource, client_id.as_deref())
                    .await
            }
        }
    }
}

async fn parse_token_response(resp: reqwest::Response) -> Result<Credential, PluginError> {
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(|e| PluginError::Auth(format!("failed to read token response: {e}")))?;

    if !status.is_success() {
        let detail = serde_json::from_slice::<TokenErrorBody>(&body)
            .ok()
            .and_then(|b| b.error_description.or(b.error))
            .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
        return Err(PluginError::Auth(format!("identity provider returned {status}: {detail}")));
    }

    let parsed: TokenResponse = serde_json::from_slice(&body)
        .map_err(|e| PluginError::Auth(format!("malformed token response: {e}")))?;
    let token = parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PluginError::Auth("token response contained no access_token".into()))?;
    let expires_in = parsed.expires_in.as_ref().and_then(Seconds::as_duration);
    Ok(Credential::new(token, expires_in))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Form, Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn sp_config() -> ProviderConfig {
        ProviderConfig {
            tenant_id: "tenant".into(),
            aad_client_id: "client".into(),
            aad_client_secret: "s3cret".into(),
            ..ProviderConfig::default()
        }
    }

    async fn fake_token_endpoint(
        Path(tenant): Path<String>,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let ok = tenant == "tenant"
            && form.get("grant_type").map(String::as_str) == Some("client_credentials")
            && form.get("client_secret").map(String::as_str) == Some("s3cret")
            && form.get("resource").map(String::as_str) == Some("https://vault.azure.net");
        if ok {
            (
                StatusCode::OK,
                Json(json!({"access_token": "tok", "expires_in": "3599", "token_type": "Bearer"})),
            )
        } else {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid_client", "error_description": "AADSTS7000215"})),
            )
        }
    }

    #[tokio::test]
    async fn service_principal_token() {
        let base = spawn(Router::new().route("/:tenant/oauth2/token", post(fake_token_endpoint))).await;
        let provider = AzureTokenProvider::new(reqwest::Client::new()).with_authority(base);

        let cred = provider.credential(&sp_config()).await.unwrap();
        assert_eq!(cred.bearer(), "tok");
        assert!(cred.valid_for(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn rejected_secret_is_auth_error() {
        let base = spawn(Router::new().route("/:tenant/oauth2/token", post(fake_token_endpoint))).await;
        let provider = AzureTokenProvider::new(reqwest::Client::new()).with_authority(base);
        let cfg = ProviderConfig {
            aad_client_secret: "wrong".into(),
            ..sp_config()
        };

        match provider.credential(&cfg).await {
            Err(PluginError::Auth(msg)) => assert!(msg.contains("AADSTS7000215"), "{msg}"),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_identity_provider_is_auth_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let provider =
            AzureTokenProvider::new(reqwest::Client::new()).with_authority("http://127.0.0.1:9");
        assert!(matches!(
            provider.credential(&sp_config()).await,
            Err(PluginError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn managed_identity_token() {
        async fn imds(
            headers: HeaderMap,
            Query(q): Query<HashMap<String, String>>,
        ) -> (StatusCode, Json<serde_json::Value>) {
            if headers.get("Metadata").is_none() || q.get("client_id").map(String::as_str) != Some("mi") {
                return (StatusCode::BAD_REQUEST, Json(json!({"error": "bad request"})));
            }
            (StatusCode::OK, Json(json!({"access_token": "mi-tok", "expires_in": 3600})))
        }
        let base = spawn(Router::new().route("/token", get(imds))).await;
        let provider = AzureTokenProvider::new(reqwest::Client::new())
            .with_imds_endpoint(format!("{base}/token"));
        let cfg = ProviderConfig {
            use_managed_identity_extension: true,
            user_assigned_identity_id: "mi".into(),
            ..ProviderConfig::default()
        };

        let cred = provider.credential(&cfg).await.unwrap();
        assert_eq!(cred.bearer(), "mi-tok");
    }

    #[tokio::test]
    async fn missing_access_token_is_auth_error() {
        async fn empty() -> Json<serde_json::Value> {
            Json(json!({"token_type": "Bearer"}))
        }
        let base = spawn(Router::new().route("/:tenant/oauth2/token", post(empty))).await;
        let provider = AzureTokenProvider::new(reqwest::Client::new()).with_authority(base);
        assert!(matches!(
            provider.credential(&sp_config()).await,
            Err(PluginError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn incomplete_config_never_calls_identity_provider() {
        let provider =
            AzureTokenProvider::new(reqwest::Client::new()).with_authority("http://127.0.0.1:9");
        let err = provider
            .credential(&ProviderConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Config(_)));
    }

    #[test]
    fn credential_debug_is_redacted() {
        let cred = Credential::new("super-secret", None);
        assert!(!format!("{cred:?}").contains("super-secret"));
        assert!(!cred.valid_for(Duration::ZERO));
    }
}
