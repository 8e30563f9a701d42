//! Optional credential cache in front of any [`TokenProvider`].
//!
//! Entries are keyed by a SHA-256 digest of the auth mode and cloud, so a
//! changed secret or identity in `azure.json` misses the cache on the next
//! request. Reads are lock-free via `arc-swap`.

use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use common::PluginError;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::provider::{AuthMode, ProviderConfig};
use super::token::{Credential, TokenProvider};

/// A cached credential is reused only while it has more than this left.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(300);

struct Entry {
    key: [u8; 32],
    credential: Credential,
}

/// Decorator that reuses a credential until it is close to expiry.
pub struct CachingTokenProvider<P> {
    inner: P,
    margin: Duration,
    entry: ArcSwapOption<Entry>,
}

impl<P: TokenProvider> CachingTokenProvider<P> {
    pub fn new(inner: P) -> Self {
        Self::with_margin(inner, DEFAULT_REFRESH_MARGIN)
    }

    pub fn with_margin(inner: P, margin: Duration) -> Self {
        Self {
            inner,
            margin,
            entry: ArcSwapOption::empty(),
        }
    }
}

#[async_trait]
impl<P: TokenProvider> TokenProvider for CachingTokenProvider<P> {
    async fn credential(&self, config: &ProviderConfig) -> Result<Credential, PluginError> {
        let key = cache_key(config)?;
        if let Some(entry) = self.entry.load_full() {
            if entry.key == key && entry.credential.valid_for(self.margin) {
                debug!("reusing cached credential");
                return Ok(entry.credential.clone());
            }
        }

        let credential = self.inner.credential(config).await?;
        if credential.valid_for(self.margin) {
            self.entry.store(Some(Arc::new(Entry {
                key,
                credential: credential.clone(),
            })));
        }
        Ok(credential)
    }
}

fn cache_key(config: &ProviderConfig) -> Result<[u8; 32], PluginError> {
    let cloud = config.cloud()?;
    let mut hasher = Sha256::new();
    hasher.update(cloud.name.as_bytes());
    match config.auth_mode()? {
        AuthMode::ServicePrincipal {
            tenant_id,
            client_id,
            client_secret,
        } => {
            for part in ["sp", tenant_id.as_str(), client_id.as_str(), client_secret.as_str()] {
                hasher.update([0u8]);
                hasher.update(part.as_bytes());
            }
        }
        AuthMode::ManagedIdentity { client_id } => {
            for part in ["mi", client_id.as_deref().unwrap_or_default()] {
                hasher.update([0u8]);
                hasher.update(part.as_bytes());
            }
        }
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::token::MockTokenProvider;

    fn sp_config(secret: &str) -> ProviderConfig {
        ProviderConfig {
            tenant_id: "tenant".into(),
            aad_client_id: "client".into(),
            aad_client_secret: secret.into(),
            ..ProviderConfig::default()
        }
    }

    #[tokio::test]
    async fn reuses_fresh_credential() {
        let mut inner = MockTokenProvider::new();
        inner
            .expect_credential()
            .times(1)
            .returning(|_| Ok(Credential::new("tok", Some(Duration::from_secs(3600)))));
        let cache = CachingTokenProvider::new(inner);

        let cfg = sp_config("a");
        assert_eq!(cache.credential(&cfg).await.unwrap().bearer(), "tok");
        assert_eq!(cache.credential(&cfg).await.unwrap().bearer(), "tok");
    }

    #[tokio::test]
    async fn changed_secret_misses_cache() {
        let mut inner = MockTokenProvider::new();
        inner
            .expect_credential()
            .times(2)
            .returning(|cfg| {
                Ok(Credential::new(
                    format!("tok-{}", cfg.aad_client_secret),
                    Some(Duration::from_secs(3600)),
                ))
            });
        let cache = CachingTokenProvider::new(inner);

        assert_eq!(cache.credential(&sp_config("a")).await.unwrap().bearer(), "tok-a");
        assert_eq!(cache.credential(&sp_config("b")).await.unwrap().bearer(), "tok-b");
    }

    #[tokio::test]
    async fn near_expiry_credential_not_cached() {
        let mut inner = MockTokenProvider::new();
        inner
            .expect_credential()
            .times(2)
            .returning(|_| Ok(Credential::new("short", Some(Duration::from_secs(10)))));
        let cache = CachingTokenProvider::new(inner);

        let cfg = sp_config("a");
        cache.credential(&cfg).await.unwrap();
        cache.credential(&cfg).await.unwrap();
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let mut inner = MockTokenProvider::new();
        inner
            .expect_credential()
            .times(2)
            .returning(|_| Err(PluginError::Auth("unreachable".into())));
        let cache = CachingTokenProvider::new(inner);

        let cfg = sp_config("a");
        assert!(cache.credential(&cfg).await.is_err());
        assert!(cache.credential(&cfg).await.is_err());
    }

    #[tokio::test]
    async fn unresolvable_config_fails_before_inner_call() {
        let mut inner = MockTokenProvider::new();
        inner.expect_credential().times(0);
        let cache = CachingTokenProvider::new(inner);

        let err = cache.credential(&ProviderConfig::default()).await.unwrap_err();
        assert!(matches!(err, PluginError::Config(_)));
    }
}
