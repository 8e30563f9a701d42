//! The `v1beta1.KeyManagementService` gRPC service.
//!
//! # Responsibilities
//! - Answer `Version` with the fixed plugin identity.
//! - Translate `Encrypt` / `Decrypt` into Key Vault operations, re-resolving
//!   configuration and credentials on every call.
//! - Map every failure to an error status; a response message is only ever
//!   sent on success.

pub mod kms;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use kms::KmsService;

/// Generated protobuf types and service traits.
pub mod proto {
    #![allow(missing_docs)]
    #![allow(clippy::all)]
    tonic::include_proto!("v1beta1");
}
