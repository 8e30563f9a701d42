//! `azurekms-plugin`: Kubernetes KMS plugin binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (JSON logs, optional OTLP).
//! 3. Build the Azure AD and Key Vault clients.
//! 4. Build the [`KmsService`] around a fixed [`PluginIdentity`].
//! 5. Clean and bind the Unix socket.
//! 6. Serve gRPC (and the debug endpoint) until SIGINT / SIGTERM.

mod azure;
mod config;
mod debug;
mod server;
mod service;
mod socket;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use common::PluginIdentity;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use azure::AzureClients;
use config::Config;
use debug::RequestLog;
use server::{DebugEndpoint, Server};
use service::KmsService;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        socket_path = %cfg.socket_path,
        "KMS plugin service starting"
    );

    // -----------------------------------------------------------------------
    // 3. Azure clients
    // -----------------------------------------------------------------------
    let clients = AzureClients::init(cfg.request_timeout(), &cfg.token_options())?;

    // -----------------------------------------------------------------------
    // 4. RPC dispatcher
    // -----------------------------------------------------------------------
    let identity = Arc::new(PluginIdentity::default());
    let service = KmsService::new(
        identity,
        &cfg.provider_config_path,
        clients,
        RequestLog::default(),
    );

    // -----------------------------------------------------------------------
    // 5. Socket
    // -----------------------------------------------------------------------
    let server = Server::bind(&cfg.socket_path, service, cfg.request_timeout())
        .map_err(|e| {
            error!(error = %e, "failed to prepare socket");
            e
        })
        .context("socket preparation failed")?
        .with_debug(DebugEndpoint {
            addr: cfg.debug_addr()?,
            policy: cfg.debug_policy()?,
        });
    info!(socket = %server.socket_path().display(), "socket bound");

    // -----------------------------------------------------------------------
    // 6. Serve
    // -----------------------------------------------------------------------
    let result = server.serve(shutdown_signal()).await;
    if let Err(e) = &result {
        error!(error = %e, "KMS plugin service failed");
    }
    telemetry::shutdown();
    result
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
