//! Unix domain socket lifecycle: clean, bind, and unlink the plugin socket.
//!
//! The plugin listens on a filesystem socket rather than TCP so that only
//! co-located processes with access to the path can reach it. A socket file
//! left behind by a crashed instance is removed before binding.

use std::{io, path::Path};

use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{debug, info};

/// Fatal startup errors from the socket layer. Never retried.
#[derive(Debug, Error)]
pub enum SocketError {
    /// A pre-existing file at the socket path could not be removed.
    #[error("failed to delete the socket file {path}: {source}")]
    Clean {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The listener could not be bound at the socket path.
    #[error("failed to start listener on {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Remove any stale file at `path`, then bind a fresh listener there.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`SocketError::Clean`] if removal fails for any reason other than
/// the file not existing, and [`SocketError::Bind`] if binding fails.
pub fn prepare(path: &Path) -> Result<UnixListener, SocketError> {
    remove_stale(path).map_err(|source| SocketError::Clean {
        path: path.display().to_string(),
        source,
    })?;

    let listener = UnixListener::bind(path).map_err(|source| SocketError::Bind {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), "socket bound");
    Ok(listener)
}

/// Unlink the socket file at shutdown. A missing file is not an error.
///
/// # Errors
///
/// Returns [`SocketError::Clean`] if the file exists but cannot be removed.
pub fn cleanup(path: &Path) -> Result<(), SocketError> {
    remove_stale(path).map_err(|source| SocketError::Clean {
        path: path.display().to_string(),
        source,
    })?;
    debug!(path = %path.display(), "socket file removed");
    Ok(())
}

fn remove_stale(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed pre-existing socket file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
