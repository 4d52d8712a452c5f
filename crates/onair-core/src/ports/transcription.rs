use async_trait::async_trait;

use crate::error::ShowError;

/// Speech-to-text collaborator used for caller audio.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one utterance of PCM16 mono recorded at `sample_rate`.
    async fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<String, ShowError>;
}
