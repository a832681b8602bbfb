//! Structured error type shared by every layer of the dumper.
//!
//! These are designed to be displayable in both CLI output and log lines.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DumpError {
    /// A local or remote file name outside the expected grammar.
    #[error("malformed filename: {name}")]
    MalformedFilename { name: String },

    #[error("remote archive not found: {key}")]
    RemoteNotFound { key: String },

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("hard stop: remote has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    /// Caller misuse, reported before any planning starts.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("listing format changed: {0}")]
    ListingFormat(String),

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DumpError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DumpError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(name: impl Into<String>) -> Self {
        DumpError::MalformedFilename { name: name.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DumpError::RemoteNotFound { .. })
    }
}
