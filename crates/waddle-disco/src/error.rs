//! Error types for service discovery.

use std::time::Duration;

use thiserror::Error;
use waddle_stanza::{StanzaError, XmppError};

/// Failures of discovery round-trips and manager operations.
#[derive(Error, Debug)]
pub enum DiscoError {
    /// The peer did not answer within the reply timeout.
    #[error("no response received within {timeout:?}")]
    NoResponse { timeout: Duration },

    /// The connection is closed, or closed while a reply was awaited.
    #[error("not connected")]
    NotConnected,

    /// The peer answered with an `error` IQ.
    #[error("error response from peer: {0}")]
    ErrorResponse(StanzaError),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Stanza(#[from] XmppError),
}

impl DiscoError {
    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an unexpected-response error.
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::UnexpectedResponse(msg.into())
    }

    /// The remote stanza error, if the peer answered with one.
    pub fn stanza_error(&self) -> Option<&StanzaError> {
        match self {
            Self::ErrorResponse(error) => Some(error),
            _ => None,
        }
    }

    /// Failures the best-effort service search skips past.
    pub(crate) fn is_peer_failure(&self) -> bool {
        matches!(self, Self::ErrorResponse(_) | Self::NoResponse { .. })
    }
}

impl From<jid::Error> for DiscoError {
    fn from(err: jid::Error) -> Self {
        Self::Stanza(XmppError::InvalidAddress(err))
    }
}
