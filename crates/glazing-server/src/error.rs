//! Error types for the server.

use thiserror::Error;

/// Server error type.
///
/// Session-level failures never surface here; they are reported to the
/// client as `error` events or logged during teardown.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not bind the listening socket.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The listener failed while serving.
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
