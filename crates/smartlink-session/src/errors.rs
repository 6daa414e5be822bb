//! Errors raised by the transport and by command helpers.

use smartlink_core::SessionError;
use smartlink_core::errors::ValidationError;
use thiserror::Error;

/// Failure to establish or keep a physical link.
///
/// These never reach request callers: the driver logs them and schedules a
/// reconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection attempt failed.
    #[error("connect to {url} failed: {reason}")]
    Connect {
        /// Target URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },
    /// The link is already closed.
    #[error("link closed")]
    Closed,
}

impl TransportError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "CONNECT_FAILED",
            Self::Closed => "LINK_CLOSED",
        }
    }
}

/// Failure of a typed device command.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CommandError {
    /// The command input was rejected before sending.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// The session could not deliver the command or its reply.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl CommandError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invalid(e) => e.code(),
            Self::Session(e) => e.code(),
        }
    }
}
