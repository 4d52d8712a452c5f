//! Failure taxonomy shared by every port boundary.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::ports::SinkError;

/// How a collaborator call failed, used to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Network hiccup, 5xx, connection reset.
    Transient,
    /// The provider asked us to slow down.
    RateLimited,
    /// Bad request, auth failure, malformed response. Retrying won't help.
    Permanent,
}

/// The external operation a timeout applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Generation,
    Synthesis,
    Transcription,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generation => "generation",
            Self::Synthesis => "synthesis",
            Self::Transcription => "transcription",
        })
    }
}

/// Coarse classification of a [`ShowError`].
///
/// A timeout is classified as the operation it interrupted, so callers can
/// treat "generation timed out" and "generation failed" the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Generation,
    Synthesis,
    Transcription,
    SinkWrite,
    TelephonyCodec,
    Cancelled,
}

/// Errors raised anywhere in the show pipeline.
#[derive(Debug, Error)]
pub enum ShowError {
    #[error("text generation failed: {message}")]
    Generation { message: String, kind: FailureKind },

    #[error("speech synthesis failed: {message}")]
    Synthesis { message: String, kind: FailureKind },

    #[error("transcription failed: {message}")]
    Transcription { message: String, kind: FailureKind },

    #[error("sink '{sink}' write failed: {source}")]
    SinkWrite {
        sink: String,
        #[source]
        source: SinkError,
    },

    #[error("telephony codec error: {0}")]
    TelephonyCodec(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: Operation, after: Duration },

    #[error("cancelled")]
    Cancelled,
}

impl ShowError {
    pub fn generation(message: impl Into<String>, kind: FailureKind) -> Self {
        Self::Generation {
            message: message.into(),
            kind,
        }
    }

    pub fn synthesis(message: impl Into<String>, kind: FailureKind) -> Self {
        Self::Synthesis {
            message: message.into(),
            kind,
        }
    }

    pub fn transcription(message: impl Into<String>, kind: FailureKind) -> Self {
        Self::Transcription {
            message: message.into(),
            kind,
        }
    }

    #[must_use]
    pub const fn timeout(operation: Operation, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    /// Classify this error, folding timeouts into their operation.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Generation { .. }
            | Self::Timeout {
                operation: Operation::Generation,
                ..
            } => ErrorKind::Generation,
            Self::Synthesis { .. }
            | Self::Timeout {
                operation: Operation::Synthesis,
                ..
            } => ErrorKind::Synthesis,
            Self::Transcription { .. }
            | Self::Timeout {
                operation: Operation::Transcription,
                ..
            } => ErrorKind::Transcription,
            Self::SinkWrite { .. } => ErrorKind::SinkWrite,
            Self::TelephonyCodec(_) => ErrorKind::TelephonyCodec,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether a bounded retry might succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Generation { kind, .. }
            | Self::Synthesis { kind, .. }
            | Self::Transcription { kind, .. } => !matches!(kind, FailureKind::Permanent),
            Self::Timeout { .. } => true,
            Self::SinkWrite { .. } | Self::TelephonyCodec(_) | Self::Cancelled => false,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_classified_as_its_operation() {
        let err = ShowError::timeout(Operation::Synthesis, Duration::from_secs(5));
        assert_eq!(err.kind(), ErrorKind::Synthesis);
        assert!(err.is_retryable());
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let err = ShowError::generation("401 unauthorized", FailureKind::Permanent);
        assert!(!err.is_retryable());
        let err = ShowError::generation("429", FailureKind::RateLimited);
        assert!(err.is_retryable());
    }

    #[test]
    fn cancellation_is_terminal() {
        assert!(!ShowError::Cancelled.is_retryable());
        assert!(ShowError::Cancelled.is_cancelled());
    }

    #[test]
    fn sink_error_is_the_source() {
        use std::error::Error as _;
        let err = ShowError::SinkWrite {
            sink: "encoder".into(),
            source: SinkError::Closed,
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("encoder"));
    }
}
