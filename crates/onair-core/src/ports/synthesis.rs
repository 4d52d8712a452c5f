use async_trait::async_trait;

use crate::domain::VoiceProfile;
use crate::error::ShowError;

/// Text-to-speech collaborator.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` as PCM16 mono at [`SAMPLE_RATE`](crate::domain::SAMPLE_RATE).
    async fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Vec<i16>, ShowError>;
}
