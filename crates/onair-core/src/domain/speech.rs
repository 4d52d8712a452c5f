//! Speech units and audio frames: the PCM that flows from agents to sinks.
//!
//! All audio inside the show is 16-bit linear PCM, mono, at
//! [`SAMPLE_RATE`]. Durations are always derived from sample counts; audio
//! is pushed to sinks, never pulled by a device clock, so the sample count is
//! the only authoritative timing source.

use std::sync::Arc;
use std::time::Duration;

/// Internal sample rate of every frame on the bus (Hz).
pub const SAMPLE_RATE: u32 = 24_000;

/// Convert a sample count at `sample_rate` into a duration.
#[must_use]
pub fn samples_to_duration(samples: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let micros = samples as u64 * 1_000_000 / u64::from(sample_rate);
    Duration::from_micros(micros)
}

/// Number of samples covering `duration` at `sample_rate`.
#[must_use]
pub fn duration_to_samples(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_micros() * u128::from(sample_rate) / 1_000_000) as usize
}

// ── AudioFrame ─────────────────────────────────────────────────────

/// A block of PCM16 mono audio handed to the distribution bus.
///
/// Cloning is cheap (the samples are shared), so one frame can be fanned out
/// to any number of sinks without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Arc<[i16]>,
    sample_rate: u32,
}

impl AudioFrame {
    /// Wrap samples recorded at `sample_rate`.
    #[must_use]
    pub fn new(samples: impl Into<Arc<[i16]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// A frame of digital silence lasting `duration` at the internal rate.
    #[must_use]
    pub fn silence(duration: Duration) -> Self {
        let len = duration_to_samples(duration, SAMPLE_RATE);
        Self::new(vec![0i16; len], SAMPLE_RATE)
    }

    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration derived from the sample count.
    #[must_use]
    pub fn duration(&self) -> Duration {
        samples_to_duration(self.samples.len(), self.sample_rate)
    }

    /// Whether every sample is zero.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }

    /// Encode as little-endian PCM16 bytes (the encoder's wire format).
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

// ── SpeechUnit ─────────────────────────────────────────────────────

/// One synthesized sentence: its text, its audio, and where it sits in the turn.
///
/// Immutable once built. A unit is played once and dropped, or dropped
/// unplayed when the turn it belongs to is interrupted.
#[derive(Debug, Clone)]
pub struct SpeechUnit {
    text: String,
    audio: AudioFrame,
    duration: Duration,
    sentence_index: usize,
}

impl SpeechUnit {
    /// Build a unit from 24 kHz PCM16 samples.
    #[must_use]
    pub fn new(text: impl Into<String>, samples: Vec<i16>, sentence_index: usize) -> Self {
        let audio = AudioFrame::new(samples, SAMPLE_RATE);
        let duration = audio.duration();
        Self {
            text: text.into(),
            audio,
            duration,
            sentence_index,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn audio(&self) -> &AudioFrame {
        &self.audio
    }

    /// Playback length, derived purely from the sample count.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    /// Zero-based position of this sentence within its turn.
    #[must_use]
    pub const fn sentence_index(&self) -> usize {
        self.sentence_index
    }

    /// Split the audio into consecutive frames of at most `chunk_samples`.
    ///
    /// Used to push a sentence onto the bus incrementally so an interrupt can
    /// stop it part-way through.
    #[must_use]
    pub fn chunks(&self, chunk_samples: usize) -> Vec<AudioFrame> {
        let size = chunk_samples.max(1);
        self.audio
            .samples()
            .chunks(size)
            .map(|c| AudioFrame::new(c.to_vec(), self.audio.sample_rate()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_comes_from_sample_count() {
        let unit = SpeechUnit::new("hello", vec![0; 12_000], 0);
        assert_eq!(unit.duration(), Duration::from_millis(500));
        assert_eq!(unit.duration_ms(), 500);
    }

    #[test]
    fn silence_frame_has_requested_length() {
        let frame = AudioFrame::silence(Duration::from_millis(250));
        assert_eq!(frame.len(), 6_000);
        assert!(frame.is_silent());
        assert_eq!(frame.duration(), Duration::from_millis(250));
    }

    #[test]
    fn chunks_cover_all_samples_in_order() {
        let samples: Vec<i16> = (0..10).collect();
        let unit = SpeechUnit::new("x", samples, 1);
        let chunks = unit.chunks(4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].samples(), &[0, 1, 2, 3]);
        assert_eq!(chunks[2].samples(), &[8, 9]);
    }

    #[test]
    fn le_bytes_are_little_endian() {
        let frame = AudioFrame::new(vec![1i16, -2], SAMPLE_RATE);
        assert_eq!(frame.to_le_bytes(), vec![0x01, 0x00, 0xFE, 0xFF]);
    }

    #[test]
    fn zero_sample_rate_has_zero_duration() {
        assert_eq!(samples_to_duration(100, 0), Duration::ZERO);
    }
}
