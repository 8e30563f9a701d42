//! Process composition: Unix socket, gRPC dispatcher, debug side channel.
//!
//! # Responsibilities
//! - Own the bound [`UnixListener`] and the [`KmsService`] as separate fields.
//! - Start the debug endpoint (unless disabled) before serving RPCs.
//! - Serve until the shutdown future resolves, then unlink the socket.
//!
//! Request handling lives entirely in [`crate::service`].

use std::{
    future::Future,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tracing::{info, warn};

use crate::debug::{self, AccessPolicy, DebugState};
use crate::service::{proto::key_management_service_server::KeyManagementServiceServer, KmsService};
use crate::socket::{self, SocketError};

/// Where and how to expose the debug endpoint.
#[derive(Debug, Clone, Copy)]
pub struct DebugEndpoint {
    pub addr: SocketAddr,
    pub policy: AccessPolicy,
}

/// The plugin server: a bound socket plus the dispatcher serving it.
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    service: KmsService,
    request_timeout: Duration,
    debug: Option<DebugEndpoint>,
}

impl Server {
    /// Prepare the socket at `socket_path` and pair it with `service`.
    ///
    /// # Errors
    ///
    /// Returns a [`SocketError`] if the path cannot be cleaned or bound; the
    /// process must not continue.
    pub fn bind(
        socket_path: impl Into<PathBuf>,
        service: KmsService,
        request_timeout: Duration,
    ) -> Result<Self, SocketError> {
        let socket_path = socket_path.into();
        let listener = socket::prepare(&socket_path)?;
        Ok(Self {
            socket_path,
            listener,
            service,
            request_timeout,
            debug: None,
        })
    }

    /// Also serve the debug endpoint. A [`AccessPolicy::Disabled`] policy is ignored.
    pub fn with_debug(mut self, endpoint: DebugEndpoint) -> Self {
        self.debug = (endpoint.policy != AccessPolicy::Disabled).then_some(endpoint);
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Serve RPCs until `shutdown` resolves, then remove the socket file.
    ///
    /// # Errors
    ///
    /// Returns an error if the debug endpoint cannot be bound, if the gRPC
    /// server fails, or if the socket file cannot be removed afterwards.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            socket_path,
            listener,
            service,
            request_timeout,
            debug,
        } = self;

        let debug_task = match debug {
            Some(endpoint) => {
                let state = DebugState::new(service.identity(), service.requests());
                match debug::spawn(endpoint.addr, state, endpoint.policy).await {
                    Ok(task) => Some(task),
                    Err(e) => {
                        if let Err(cleanup) = socket::cleanup(&socket_path) {
                            warn!(error = %cleanup, "failed to remove socket file after startup error");
                        }
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        info!(
            socket = %socket_path.display(),
            provider_config = %service.provider_config_path().display(),
            "KMS plugin service started"
        );

        let served = tonic::transport::Server::builder()
            .timeout(request_timeout)
            .add_service(KeyManagementServiceServer::new(service))
            .serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown)
            .await
            .context("gRPC server failed");

        if let Some(task) = debug_task {
            task.abort();
        }
        if let Err(e) = socket::cleanup(&socket_path) {
            warn!(error = %e, "failed to remove socket file on shutdown");
            served?;
            return Err(e.into());
        }
        info!("KMS plugin service stopped");
        served
    }
}
