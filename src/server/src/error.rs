//! Lifecycle Errors

use std::net::SocketAddr;
use std::time::Duration;

/// Errors surfaced by `start`/`stop` on the server and its listener
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound (port in use, permission denied, ...)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// In-flight requests outlived the shutdown timeout; the socket is closed
    /// but the listener is still draining
    #[error("listener on {addr} did not close within {timeout:?}")]
    CloseTimeout { addr: SocketAddr, timeout: Duration },

    /// The serve task ended abnormally while closing
    #[error("listener on {addr} failed to close: {reason}")]
    Close { addr: SocketAddr, reason: String },
}

impl ServerError {
    /// Underlying I/O error kind for bind failures
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            ServerError::Bind { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
