//! Configuration loading and validation for the plugin process.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is present but invalid.
//! The Azure provider configuration (`azure.json`) is separate: it is re-read
//! on every request, see [`crate::azure::provider`].

use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::azure::TokenOptions;
use crate::debug::AccessPolicy;

/// Validated plugin process configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Unix domain socket the API server dials.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// Path of the Azure provider configuration file.
    #[serde(default = "default_provider_config_path")]
    pub provider_config_path: String,

    /// TCP address of the debug/introspection endpoint.
    #[serde(default = "default_debug_listen_addr")]
    pub debug_listen_addr: String,

    /// Who may reach the debug endpoint: `loopback`, `any` or `disabled`.
    #[serde(default = "default_debug_access")]
    pub debug_access: String,

    /// Server-side ceiling for a single RPC, also used as the HTTP client
    /// timeout towards Azure AD and Key Vault.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Reuse Azure AD tokens until shortly before they expire.
    #[serde(default)]
    pub token_cache: bool,

    /// Cached tokens with less lifetime left than this are refreshed.
    #[serde(default = "default_token_refresh_margin")]
    pub token_refresh_margin_secs: u64,

    /// Azure AD authority replacing the cloud default (sovereign or private endpoints).
    #[serde(default)]
    pub aad_authority_host: Option<String>,

    /// Managed identity token endpoint replacing the IMDS default.
    #[serde(default)]
    pub imds_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP endpoint for span export. Spans are not exported when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_socket_path() -> String {
    "/tmp/azurekms.socket".into()
}
fn default_provider_config_path() -> String {
    "/etc/kubernetes/azure.json".into()
}
fn default_debug_listen_addr() -> String {
    "127.0.0.1:7901".into()
}
fn default_debug_access() -> String {
    "loopback".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_token_refresh_margin() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Parsed debug endpoint address.
    pub fn debug_addr(&self) -> Result<SocketAddr> {
        self.debug_listen_addr
            .parse()
            .with_context(|| format!("DEBUG_LISTEN_ADDR {:?} is not a socket address", self.debug_listen_addr))
    }

    /// Parsed debug endpoint access policy.
    pub fn debug_policy(&self) -> Result<AccessPolicy> {
        self.debug_access
            .parse()
            .map_err(|e| anyhow::anyhow!("DEBUG_ACCESS: {e}"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// How the Azure clients obtain and reuse credentials.
    pub fn token_options(&self) -> TokenOptions {
        TokenOptions {
            cache: self.token_cache,
            refresh_margin: Duration::from_secs(self.token_refresh_margin_secs),
            authority: self.aad_authority_host.clone(),
            imds_endpoint: self.imds_endpoint.clone(),
        }
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.socket_path, "SOCKET_PATH")?;
        ensure_non_empty(&self.provider_config_path, "PROVIDER_CONFIG_PATH")?;
        self.debug_addr()?;
        self.debug_policy()?;

        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(endpoint, "OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }
        if let Some(host) = &self.aad_authority_host {
            ensure_non_empty(host, "AAD_AUTHORITY_HOST")?;
        }
        if let Some(endpoint) = &self.imds_endpoint {
            ensure_non_empty(endpoint, "IMDS_ENDPOINT")?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            provider_config_path: default_provider_config_path(),
            debug_listen_addr: default_debug_listen_addr(),
            debug_access: default_debug_access(),
            request_timeout_secs: default_request_timeout(),
            token_cache: false,
            token_refresh_margin_secs: default_token_refresh_margin(),
            aad_authority_host: None,
            imds_endpoint: None,
            log_level: default_log_level(),
            otel_exporter_otlp_endpoint: None,
        }
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_socket_path(), "/tmp/azurekms.socket");
        assert_eq!(default_provider_config_path(), "/etc/kubernetes/azure.json");
        assert_eq!(default_debug_listen_addr(), "127.0.0.1:7901");
        assert_eq!(default_debug_access(), "loopback");
        assert_eq!(default_request_timeout(), 30);
        assert_eq!(default_token_refresh_margin(), 300);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.debug_policy().unwrap(), AccessPolicy::LoopbackOnly);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn validate_rejects_empty_socket_path() {
        let cfg = Config {
            socket_path: " ".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_debug_addr() {
        let cfg = Config {
            debug_listen_addr: "localhost".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_access_policy() {
        let cfg = Config {
            debug_access: "always".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn token_options_follow_config() {
        let cfg = Config {
            token_cache: true,
            token_refresh_margin_secs: 60,
            aad_authority_host: Some("https://login.example.test".into()),
            ..Config::default()
        };
        let options = cfg.token_options();
        assert!(options.cache);
        assert_eq!(options.refresh_margin, Duration::from_secs(60));
        assert_eq!(options.authority.as_deref(), Some("https://login.example.test"));
        assert!(options.imds_endpoint.is_none());
    }

    #[test]
    fn validate_rejects_blank_authority_host() {
        let cfg = Config {
            aad_authority_host: Some("".into()),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let cfg = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
