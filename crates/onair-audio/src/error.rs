//! Audio plumbing error types.

/// Errors that can occur in sinks and the telephony bridge.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// A carrier media payload was not valid base64.
    #[error("Invalid media payload: {0}")]
    InvalidPayload(#[from] base64::DecodeError),

    /// A carrier message could not be parsed.
    #[error("Malformed carrier message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    /// No encoder command was configured.
    #[error("Encoder command is empty")]
    EmptyCommand,

    /// The encoder process could not be started.
    #[error("Failed to spawn encoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open the local output device.
    #[error("Failed to open audio output: {0}")]
    OutputUnavailable(String),

    /// The dedicated playback thread is gone.
    #[error("Audio thread died unexpectedly")]
    AudioThreadDied,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
