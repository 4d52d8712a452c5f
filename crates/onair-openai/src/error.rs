//! Provider errors.
//!
//! These stay inside this crate; the port implementations convert them into
//! [`ShowError`] with a [`FailureKind`] the agent's retry policy understands.

use onair_core::{FailureKind, Operation, ShowError};
use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The server answered with a non-success status.
    #[error("{url} returned {status}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The body parsed but did not contain what we asked for.
    #[error("empty response from {0}")]
    Empty(String),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("could not encode audio: {0}")]
    Wav(#[from] hound::Error),
}

impl ProviderError {
    /// How the agent should treat this failure.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Status { status: 429, .. } => FailureKind::RateLimited,
            Self::Status { status, .. } if *status >= 500 || *status == 408 => {
                FailureKind::Transient
            }
            Self::Network(e) if e.is_builder() => FailureKind::Permanent,
            Self::Network(_) | Self::Empty(_) => FailureKind::Transient,
            Self::Status { .. } | Self::Decode(_) | Self::Wav(_) => FailureKind::Permanent,
        }
    }

    /// Convert at the port boundary.
    #[must_use]
    pub fn into_show_error(self, operation: Operation) -> ShowError {
        let kind = self.failure_kind();
        let message = self.to_string();
        match operation {
            Operation::Generation => ShowError::generation(message, kind),
            Operation::Synthesis => ShowError::synthesis(message, kind),
            Operation::Transcription => ShowError::transcription(message, kind),
        }
    }
}
