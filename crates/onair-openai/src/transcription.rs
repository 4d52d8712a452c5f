//! `audio/transcriptions`: caller utterances uploaded as 16-bit WAV.

use std::io::Cursor;
use std::time::Instant;

use async_trait::async_trait;
use onair_core::{Operation, ShowError, Transcriber};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::client::OpenAiClient;
use crate::error::ProviderResult;

const PATH: &str = "audio/transcriptions";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Wrap mono PCM16 in a WAV container.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> ProviderResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buffer = Vec::with_capacity(44 + samples.len() * 2);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(buffer)
}

impl OpenAiClient {
    /// Transcribe one utterance. An empty string means nothing was heard.
    pub async fn transcription(&self, samples: &[i16], sample_rate: u32) -> ProviderResult<String> {
        let started = Instant::now();
        let wav = encode_wav(samples, sample_rate)?;
        let file = Part::bytes(wav)
            .file_name("caller.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", self.config().transcription_model.clone())
            .text("response_format", "json")
            .part("file", file);

        let (url, request) = self.post(PATH);
        let response = self.send(&url, request.multipart(form)).await?;
        let bytes = response.bytes().await?;
        let parsed: TranscriptionResponse = serde_json::from_slice(&bytes)?;
        let text = parsed.text.trim().to_string();

        debug!(
            samples = samples.len(),
            sample_rate,
            chars = text.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Caller audio transcribed"
        );
        Ok(text)
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<String, ShowError> {
        self.transcription(samples, sample_rate)
            .await
            .map_err(|e| e.into_show_error(Operation::Transcription))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_round_trips_through_hound() {
        let samples = [0i16, 1_000, -1_000, i16::MAX, i16::MIN];
        let wav = encode_wav(&samples, 8_000).unwrap();
        assert_eq!(&wav[..4], b"RIFF");

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 8_000);
        assert_eq!(spec.channels, 1);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(decoded, samples);
    }
}
