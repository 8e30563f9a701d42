//! Common types, protocol definitions, and errors shared across `azure-kms-plugin` crates.

pub mod error;
pub mod identity;
pub mod key;
pub mod protocol;

pub use error::PluginError;
pub use identity::PluginIdentity;
pub use key::KeyReference;
