//! Error types for Tessera.

use std::sync::Arc;

use crate::message::MessageId;

/// Main error type for Tessera operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TesseraError {
    /// Codec error (traversal, backend grammar)
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Transport-level error (stream, framing, cancellation)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Type identifier absent from the registry
    #[error("unknown type: {0}")]
    UnknownType(MessageId),

    /// A cast requested a type that does not match the envelope
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Identifier of the requested type
        expected: MessageId,
        /// Identifier carried by the envelope
        actual: MessageId,
    },

    /// Two distinct types claimed the same identifier
    #[error("duplicate type id {id}: `{existing}` already registered, rejected `{rejected}`")]
    DuplicateType {
        /// The contested identifier
        id: MessageId,
        /// Name of the type that owns the identifier
        existing: &'static str,
        /// Name of the type that was turned away
        rejected: &'static str,
    },
}

/// Codec errors raised while walking the traversal contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Declared and actual element or field counts disagree
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    /// Backend-specific grammar error
    #[error("format violation: {0}")]
    FormatViolation(String),

    /// Input ended before a value was complete
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the pending read
        needed: usize,
        /// Bytes left in the input
        remaining: usize,
    },
}

/// Transport-level errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// IO error from the underlying stream
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),

    /// Operation attempted on a closed or half-closed channel
    #[error("transport closed")]
    Closed,

    /// Declared frame length exceeds the configured bound
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared frame size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Operation unblocked by explicit cancellation
    #[error("operation cancelled")]
    Cancelled,

    /// Frame header or slice sequence is malformed
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Peer registry version differs from ours
    #[error("version mismatch: local {local}, remote {remote}")]
    VersionMismatch {
        /// Local registry version
        local: String,
        /// Version announced by the peer
        remote: String,
    },

    /// Worker pool task failed to complete
    #[error("worker failed: {0}")]
    Worker(String),
}

/// Flat classification of every failure a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    StructuralMismatch,
    FormatViolation,
    UnknownType,
    TypeMismatch,
    TransportClosed,
    FrameTooLarge,
    Cancelled,
    /// Anything else: raw IO failures, worker panics, registry conflicts.
    Other,
}

impl CodecError {
    /// Create a structural mismatch error.
    #[must_use]
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::StructuralMismatch(msg.into())
    }

    /// Create a format violation error.
    #[must_use]
    pub fn format(msg: impl Into<String>) -> Self {
        Self::FormatViolation(msg.into())
    }

    /// Size mismatch between a declared count and the expected one.
    #[must_use]
    pub fn size_mismatch(what: &str, expected: usize, actual: usize) -> Self {
        Self::StructuralMismatch(format!("{what}: expected {expected} elements, found {actual}"))
    }
}

impl TransportError {
    /// Map an IO error, folding the "peer went away" family into `Closed`.
    #[must_use]
    pub fn from_io(e: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        match e.kind() {
            Io::UnexpectedEof | Io::BrokenPipe | Io::ConnectionReset | Io::ConnectionAborted
            | Io::WriteZero | Io::NotConnected => Self::Closed,
            _ => Self::Io(Arc::new(e)),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::from_io(e)
    }
}

impl From<std::io::Error> for TesseraError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(TransportError::from_io(e))
    }
}

impl TesseraError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Codec(CodecError::StructuralMismatch(_)) => ErrorKind::StructuralMismatch,
            Self::Codec(CodecError::FormatViolation(_) | CodecError::UnexpectedEof { .. }) => {
                ErrorKind::FormatViolation
            }
            Self::UnknownType(_) => ErrorKind::UnknownType,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::Transport(TransportError::Closed) => ErrorKind::TransportClosed,
            Self::Transport(TransportError::FrameTooLarge { .. }) => ErrorKind::FrameTooLarge,
            Self::Transport(TransportError::Cancelled) => ErrorKind::Cancelled,
            _ => ErrorKind::Other,
        }
    }

    /// Check if this error indicates the channel should be closed.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Transport(
                TransportError::Closed
                    | TransportError::Io(_)
                    | TransportError::InvalidFrame(_)
                    | TransportError::Cancelled
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TesseraError::TypeMismatch {
            expected: MessageId::new(1),
            actual: MessageId::new(2),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch: expected 0x00000001, found 0x00000002"
        );
    }

    #[test]
    fn test_io_eof_maps_to_closed() {
        let err = TransportError::from(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, TransportError::Closed));

        let err = TransportError::from(std::io::Error::other("boom"));
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    fn test_kind() {
        let err: TesseraError = CodecError::structural("tuple arity").into();
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);

        let err: TesseraError = TransportError::Closed.into();
        assert_eq!(err.kind(), ErrorKind::TransportClosed);
        assert!(err.is_connection_error());

        let err = TesseraError::UnknownType(MessageId::new(7));
        assert_eq!(err.kind(), ErrorKind::UnknownType);
        assert!(!err.is_connection_error());
    }
}
