//! Error types for the dev server.

use std::io;
use std::net::SocketAddr;

use turbines_site::BuildError;

/// Dev server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured host and port do not form a socket address.
    #[error("Invalid listen address {host}:{port}")]
    InvalidAddress {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },

    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The site builder could not be prepared.
    #[error("Failed to load site: {0}")]
    Load(#[source] BuildError),

    /// The file watcher could not be started.
    #[error("Failed to watch {path}: {source}")]
    Watch {
        /// Watch root.
        path: String,
        /// Underlying error.
        #[source]
        source: notify::Error,
    },

    /// An ignore pattern is not a valid glob.
    #[error("Invalid ignore pattern {pattern:?}: {source}")]
    IgnorePattern {
        /// Offending pattern.
        pattern: String,
        /// Underlying error.
        #[source]
        source: glob::PatternError,
    },

    /// I/O error while serving.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
