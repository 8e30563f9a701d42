//! Azure collaborators: provider configuration, Azure AD tokens, Key Vault.
//!
//! Every request re-reads the provider configuration, acquires a credential,
//! and calls Key Vault. Nothing here retries; the API server owns retry policy.

pub mod cache;
pub mod clients;
pub mod keyvault;
pub mod provider;
pub mod token;

pub use clients::{AzureClients, TokenOptions};
pub use keyvault::KeyOperationBackend;
pub use provider::ProviderConfig;
pub use token::{Credential, TokenProvider};
