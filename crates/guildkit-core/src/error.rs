//! Errors reported by the messaging collaborator.

use thiserror::Error;

/// Errors returned by [`Messenger`](crate::Messenger) calls.
///
/// The core never retries these; callers decide whether a failure is worth
/// surfacing to the user.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The gateway connection is not available.
    #[error("not connected to the gateway")]
    NotConnected,

    /// The call did not complete within the collaborator's timeout.
    #[error("request timed out")]
    Timeout,

    /// The remote side refused the request.
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// Status code reported by the remote side.
        status: u16,
        /// Human-readable reason.
        message: String,
    },

    /// The referenced channel, message or user does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other transport-level failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ApiError {
    /// Creates a rejection error.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

/// Result type for messaging calls.
pub type ApiResult<T> = Result<T, ApiError>;
