//! `audio/speech` with `response_format: pcm`, which is raw 24 kHz PCM16 LE.

use std::time::Instant;

use async_trait::async_trait;
use onair_core::{Operation, ShowError, SpeechSynthesizer, VoiceProfile};
use serde::Serialize;
use tracing::{debug, warn};

use crate::client::OpenAiClient;
use crate::error::{ProviderError, ProviderResult};

const PATH: &str = "audio/speech";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
    speed: f32,
}

/// Little-endian byte pairs to samples. A dangling odd byte is dropped.
pub(crate) fn pcm_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    let chunks = bytes.chunks_exact(2);
    if !chunks.remainder().is_empty() {
        warn!(len = bytes.len(), "Odd PCM byte count, dropping last byte");
    }
    chunks
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

impl OpenAiClient {
    /// Synthesize `text`; returns 24 kHz mono samples.
    pub async fn speech(&self, text: &str, voice: &VoiceProfile) -> ProviderResult<Vec<i16>> {
        let started = Instant::now();
        let body = SpeechRequest {
            model: &self.config().speech_model,
            input: text,
            voice: &voice.voice,
            response_format: "pcm",
            speed: voice.speed,
        };
        let (url, request) = self.post(PATH);
        let response = self.send(&url, request.json(&body)).await?;

        let bytes = response.bytes().await?;
        let samples = pcm_from_le_bytes(&bytes);
        if samples.is_empty() {
            return Err(ProviderError::Empty(url));
        }

        debug!(
            voice = %voice.voice,
            chars = text.len(),
            samples = samples.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Speech synthesized"
        );
        Ok(samples)
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiClient {
    async fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Vec<i16>, ShowError> {
        self.speech(text, voice)
            .await
            .map_err(|e| e.into_show_error(Operation::Synthesis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_pairs() {
        let bytes = [0x01, 0x00, 0xff, 0x7f, 0x00, 0x80, 0x2a];
        assert_eq!(pcm_from_le_bytes(&bytes), vec![1, i16::MAX, i16::MIN]);
    }

    #[test]
    fn request_asks_for_raw_pcm() {
        let body = SpeechRequest {
            model: "tts-1",
            input: "Hello.",
            voice: "alloy",
            response_format: "pcm",
            speed: 1.25,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["response_format"], "pcm");
        assert_eq!(value["speed"], 1.25);
    }
}
