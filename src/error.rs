use std::net::SocketAddr;

use thiserror::Error;

/// Errors reported by the app server.
#[derive(Debug, Error)]
pub enum ServeError {
    /// `serve` was called without options.
    #[error("requires option parameter")]
    MissingOptions,

    /// The callback flavour of `serve` was called outside a tokio runtime.
    #[error("serve_with must be called from within a tokio runtime")]
    NoRuntime,

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Accept or connection failure after the server started.
    #[error("server i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServeError {
    /// The underlying I/O error kind, if any.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            ServeError::MissingOptions | ServeError::NoRuntime => None,
            ServeError::Bind { source, .. } => Some(source.kind()),
            ServeError::Io(e) => Some(e.kind()),
        }
    }
}
