//! Transport errors

use std::io;
use thiserror::Error;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Declared frame body exceeds the limit
    #[error("Frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Declared body size
        size: usize,
        /// Maximum accepted body size
        max: usize,
    },

    /// Frame could not be decoded or encoded
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Peer sent a disconnect frame
    #[error("Peer disconnected: {reason}")]
    Disconnected {
        /// Reason sent by the peer
        reason: String,
    },

    /// Stream ended or the connection was closed locally
    #[error("Connection closed")]
    Closed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Transport result type
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create an invalid frame error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidFrame(message.into())
    }

    /// Whether the error only means the peer went away
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Io(e) => is_disconnect(e.kind()),
            _ => false,
        }
    }
}

/// IO error kinds that mean the peer is gone
pub(crate) fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
    )
}

impl From<TransportError> for pktlog_core::Error {
    fn from(err: TransportError) -> Self {
        if err.is_closed() {
            return Self::ConnectionClosed;
        }
        match err {
            TransportError::Disconnected { reason } => Self::Disconnected { reason },
            TransportError::Io(e) => Self::Io(e),
            other => Self::Protocol(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_reason_survives_conversion() {
        let err: pktlog_core::Error = TransportError::Disconnected {
            reason: "kicked".into(),
        }
        .into();
        assert_eq!(err.disconnect_reason(), Some("kicked"));
    }

    #[test]
    fn test_eof_is_closed() {
        let err = TransportError::Io(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(err.is_closed());
        assert!(matches!(
            pktlog_core::Error::from(err),
            pktlog_core::Error::ConnectionClosed
        ));
    }

    #[test]
    fn test_frame_errors_become_protocol_errors() {
        let err = pktlog_core::Error::from(TransportError::FrameTooLarge { size: 20, max: 10 });
        assert!(matches!(err, pktlog_core::Error::Protocol(_)));
        assert!(err.to_string().contains("20 bytes"));
    }
}
