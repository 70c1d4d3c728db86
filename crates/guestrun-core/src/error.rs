//! Error types for guestrun-core.

use crate::config::ConfigError;
use guestrun_vim::{ManagedObjectRef, VimError};
use thiserror::Error;

/// Result type alias for guestrun-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while driving guest operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A management endpoint call failed
    #[error("management endpoint error: {0}")]
    Vim(#[from] VimError),

    /// The guest refused to start the program
    #[error("failed to start {program} in guest: {source}")]
    StartProgram {
        /// Executable that was requested.
        program: String,
        /// Underlying endpoint error.
        #[source]
        source: VimError,
    },

    /// Upload answered with a non-success status
    #[error("upload to {path} failed with HTTP {status}")]
    Upload {
        /// Guest target path.
        path: String,
        /// HTTP status code.
        status: u16,
    },

    /// Download answered with a non-success status (only raised on request)
    #[error("download of {path} failed with HTTP {status}")]
    Download {
        /// Guest source path.
        path: String,
        /// HTTP status code.
        status: u16,
    },

    /// Byte transfer failed before a response was received
    #[error("transfer error: {0}")]
    Transfer(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Command line could not be turned into a program spec
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The endpoint does not offer a required capability
    #[error("unsupported by endpoint: {0}")]
    Unsupported(String),

    /// A single-object query returned nothing
    #[error("object not found: {0}")]
    ObjectNotFound(ManagedObjectRef),

    /// Retry policy exhausted while waiting on a guest process
    #[error("gave up on guest process {pid} after {attempts} consecutive failures: {source}")]
    PollRetriesExhausted {
        /// Guest process id.
        pid: i64,
        /// Consecutive failed attempts.
        attempts: u32,
        /// Last failure.
        #[source]
        source: Box<CoreError>,
    },

    /// Waiting was cancelled by the caller
    #[error("wait for guest process {pid} cancelled")]
    Cancelled {
        /// Guest process id.
        pid: i64,
    },

    /// Reserved operation without an implementation
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CoreError {
    /// Check if this error is likely to clear up on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Vim(e) => e.is_retryable(),
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Transfer(_) => true,
            _ => false,
        }
    }
}
