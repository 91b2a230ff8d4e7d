//! Error types for recording ingestion and broadcast.
//!
//! Every failure in the pipeline is scoped: a malformed recording ends the
//! pipeline of that one source, a broken socket ends that one viewer. Nothing
//! here is ever propagated into the shared clip distributor.
//!
//! ## Error Categories
//!
//! - **File Errors**: a recording could not be opened or read (transient in tail mode)
//! - **Stream Errors**: malformed record headers, truncated payloads, timestamp regressions
//! - **Connection Errors**: viewer sockets and the broadcast listener
//! - **Discovery Errors**: process table scans
//! - **Config Errors**: invalid tunables
//!
//! ```rust
//! use ttyrec_tv::BroadcastError;
//! use std::path::PathBuf;
//!
//! let error = BroadcastError::malformed(PathBuf::from("/tmp/session.tty"), 24, "length too large");
//! assert!(!error.is_retryable());
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for broadcast operations.
pub type Result<T, E = BroadcastError> = std::result::Result<T, E>;

/// Main error type for broadcast operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BroadcastError {
    #[error("Recording file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record in {path} at offset {offset}: {details}")]
    MalformedRecord { path: PathBuf, offset: u64, details: String },

    #[error("Timestamp regression in {path} at offset {offset}: {current:.6}s after {previous:.6}s")]
    OutOfOrder { path: PathBuf, offset: u64, previous: f64, current: f64 },

    #[error("Viewer connection failed: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Failed to bind broadcast listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Process discovery failed: {reason}")]
    Discovery {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid configuration: {details}")]
    Config { details: String },
}

impl BroadcastError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            BroadcastError::File { .. } => true,
            BroadcastError::Connection { .. } => true,
            BroadcastError::Discovery { .. } => true,
            BroadcastError::MalformedRecord { .. } => false,
            BroadcastError::OutOfOrder { .. } => false,
            BroadcastError::Bind { .. } => false,
            BroadcastError::Config { .. } => false,
        }
    }

    /// Whether the error ends the pipeline of a single source.
    pub fn is_stream_fatal(&self) -> bool {
        matches!(self, BroadcastError::MalformedRecord { .. } | BroadcastError::OutOfOrder { .. })
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        BroadcastError::File { path, source }
    }

    /// Helper constructor for malformed record errors.
    pub fn malformed(path: PathBuf, offset: u64, details: impl Into<String>) -> Self {
        BroadcastError::MalformedRecord { path, offset, details: details.into() }
    }

    /// Helper constructor for viewer connection errors.
    pub fn connection_failed(reason: impl Into<String>, source: std::io::Error) -> Self {
        BroadcastError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for discovery errors.
    pub fn discovery_failed(reason: impl Into<String>, source: Option<std::io::Error>) -> Self {
        BroadcastError::Discovery { reason: reason.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        BroadcastError::Config { details: details.into() }
    }
}

impl From<std::io::Error> for BroadcastError {
    fn from(err: std::io::Error) -> Self {
        BroadcastError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
