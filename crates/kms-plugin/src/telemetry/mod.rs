//! Structured logging and optional OpenTelemetry span export.
//!
//! # Telemetry invariants
//!
//! - **No plaintext, ciphertext, tokens or client secrets** may appear in any
//!   span attribute or log field.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`), overridden
//!   by `RUST_LOG` when set.

pub mod init;

pub use init::{init_telemetry, shutdown};
