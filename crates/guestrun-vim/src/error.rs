//! Error types for guestrun-vim.

use thiserror::Error;

/// Result type alias for management endpoint calls.
pub type Result<T> = std::result::Result<T, VimError>;

/// Errors raised by a [`VimService`](crate::VimService) implementation.
#[derive(Debug, Clone, Error)]
pub enum VimError {
    /// Network or connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a fault.
    #[error("{fault}: {message}")]
    Fault {
        /// Fault type name reported by the endpoint (e.g. `InvalidGuestLogin`).
        fault: String,
        /// Human-readable fault message.
        message: String,
    },

    /// The session backing the connection is no longer authenticated.
    #[error("session is not authenticated")]
    NotAuthenticated,

    /// The endpoint answered with something that could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl VimError {
    /// Create a fault error.
    pub fn fault(fault: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fault {
            fault: fault.into(),
            message: message.into(),
        }
    }

    /// Check if this error is worth retrying without caller intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::InvalidResponse(_))
    }
}
