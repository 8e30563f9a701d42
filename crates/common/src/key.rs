//! [`KeyReference`]: which remote key every operation uses.

use crate::error::PluginError;

/// Vault location, key name and key version of the remote key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReference {
    /// Base URL of the vault, e.g. `https://my-vault.vault.azure.net/`.
    pub vault_base_url: String,
    pub key_name: String,
    pub key_version: String,
}

impl KeyReference {
    /// Build a reference, rejecting any empty component.
    ///
    /// Key name and version become URL path segments, so both are limited to
    /// the Key Vault charset (ASCII letters, digits and `-`).
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Config`] naming the first missing or invalid
    /// component.
    pub fn new(
        vault_base_url: impl Into<String>,
        key_name: impl Into<String>,
        key_version: impl Into<String>,
    ) -> Result<Self, PluginError> {
        let key = Self {
            vault_base_url: vault_base_url.into(),
            key_name: key_name.into(),
            key_version: key_version.into(),
        };
        ensure_present(&key.vault_base_url, "vault base URL")?;
        ensure_present(&key.key_name, "key name")?;
        ensure_present(&key.key_version, "key version")?;
        ensure_segment(&key.key_name, "key name")?;
        ensure_segment(&key.key_version, "key version")?;
        Ok(key)
    }

    /// URL of a key operation (`encrypt` / `decrypt`) on this key version.
    pub fn operation_url(&self, operation: &str) -> String {
        format!(
            "{}/keys/{}/{}/{}",
            self.vault_base_url.trim_end_matches('/'),
            self.key_name,
            self.key_version,
            operation
        )
    }
}

fn ensure_present(value: &str, what: &str) -> Result<(), PluginError> {
    if value.trim().is_empty() {
        return Err(PluginError::Config(format!("{what} is required")));
    }
    Ok(())
}

fn ensure_segment(value: &str, what: &str) -> Result<(), PluginError> {
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(PluginError::Config(format!(
            "{what} {value:?} may only contain letters, digits and '-'"
        )));
    }
    Ok(())
}
