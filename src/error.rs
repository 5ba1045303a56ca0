//! Error types
//!
//! `BuildError` belongs to the bundler and is fatal only in production mode.
//! `Error` is what the entry points return.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate-level error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A build failed as a whole. No partial output is reported as success.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The configured source directory does not exist or is not a directory
    #[error("source directory not found: {0}")]
    SourceMissing(PathBuf),

    /// Reading a source or writing an output failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An entry document could not be rewritten
    #[error("failed to process {path}: {message}")]
    Html { path: PathBuf, message: String },

    /// The build cache manifest could not be written
    #[error("build cache error on {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The blocking build task did not complete
    #[error("build task failed: {0}")]
    Join(String),
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Crate-level error returned by the entry points.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
