//! Voice activity detection for phone callers.
//!
//! Frame-energy hysteresis: a run of loud frames confirms speech, a longer
//! run of quiet frames ends it. Confirmation is reported immediately so the
//! show can stop talking over the caller; the utterance itself is handed
//! over only once it ends.

use std::time::Duration;

use onair_core::{TelephonySettings, samples_to_duration};

/// VAD configuration parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct VadConfig {
    /// RMS energy (normalised to `[0, 1]`) above which a frame is speech.
    pub threshold: f32,
    /// Consecutive loud frames before speech is confirmed.
    pub speech_start_frames: u32,
    /// Consecutive quiet frames before speech is considered over.
    pub speech_end_frames: u32,
    /// Segments shorter than this (excluding trailing silence) are dropped.
    pub min_segment: Duration,
    /// Rate of the PCM fed to [`CallVad::process_frame`].
    pub sample_rate: u32,
}

impl VadConfig {
    #[must_use]
    pub const fn from_settings(settings: &TelephonySettings, sample_rate: u32) -> Self {
        Self {
            threshold: settings.vad_threshold,
            speech_start_frames: settings.speech_start_frames,
            speech_end_frames: settings.speech_end_frames,
            min_segment: settings.min_segment(),
            sample_rate,
        }
    }
}

/// Current VAD state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    /// No speech.
    Silence,
    /// Loud frames seen, not yet enough to confirm.
    SpeechStarting,
    /// Speech confirmed, accumulating the utterance.
    Speaking,
    /// Quiet frames after speech; the utterance may be ending.
    SpeechEnding,
}

/// Events emitted by the VAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VadEvent {
    /// Speech has been confirmed.
    SpeechStart,
    /// An utterance ended. Trailing silence is trimmed.
    SpeechEnd { audio: Vec<i16> },
    /// An utterance ended but was too short to keep.
    Discarded { duration: Duration },
}

/// Per-call detector. Owned by exactly one call handler.
#[derive(Debug)]
pub struct CallVad {
    config: VadConfig,
    state: VadState,
    speech_frame_count: u32,
    silence_frame_count: u32,
    speech_buffer: Vec<i16>,
    trailing_silence: usize,
}

impl CallVad {
    #[must_use]
    pub const fn new(config: VadConfig) -> Self {
        Self {
            config,
            state: VadState::Silence,
            speech_frame_count: 0,
            silence_frame_count: 0,
            speech_buffer: Vec::new(),
            trailing_silence: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> VadState {
        self.state
    }

    /// Feed one frame of PCM and return at most one event.
    pub fn process_frame(&mut self, frame: &[i16]) -> Option<VadEvent> {
        let energy = rms_energy(frame);
        let is_speech = energy > self.config.threshold;

        match self.state {
            VadState::Silence => {
                if is_speech {
                    self.speech_buffer.extend_from_slice(frame);
                    self.speech_frame_count = 1;
                    self.state = VadState::SpeechStarting;
                    return self.confirm_if_ready(energy);
                }
            }

            VadState::SpeechStarting => {
                if is_speech {
                    self.speech_buffer.extend_from_slice(frame);
                    self.speech_frame_count += 1;
                    return self.confirm_if_ready(energy);
                }
                // A blip, not speech.
                self.reset();
            }

            VadState::Speaking => {
                self.speech_buffer.extend_from_slice(frame);
                if !is_speech {
                    self.state = VadState::SpeechEnding;
                    self.silence_frame_count = 1;
                    self.trailing_silence = frame.len();
                    return self.finish_if_ready();
                }
            }

            VadState::SpeechEnding => {
                self.speech_buffer.extend_from_slice(frame);
                if is_speech {
                    self.state = VadState::Speaking;
                    self.silence_frame_count = 0;
                    self.trailing_silence = 0;
                } else {
                    self.silence_frame_count += 1;
                    self.trailing_silence += frame.len();
                    return self.finish_if_ready();
                }
            }
        }

        None
    }

    fn confirm_if_ready(&mut self, energy: f32) -> Option<VadEvent> {
        if self.speech_frame_count < self.config.speech_start_frames {
            return None;
        }
        self.state = VadState::Speaking;
        self.silence_frame_count = 0;
        tracing::debug!(energy, frames = self.speech_frame_count, "VAD: speech confirmed");
        Some(VadEvent::SpeechStart)
    }

    fn finish_if_ready(&mut self) -> Option<VadEvent> {
        if self.silence_frame_count < self.config.speech_end_frames {
            return None;
        }

        let mut audio = std::mem::take(&mut self.speech_buffer);
        audio.truncate(audio.len().saturating_sub(self.trailing_silence));
        self.reset();

        let duration = samples_to_duration(audio.len(), self.config.sample_rate);
        if duration < self.config.min_segment {
            tracing::debug!(duration_ms = duration.as_millis() as u64, "VAD: segment too short");
            return Some(VadEvent::Discarded { duration });
        }

        tracing::debug!(
            samples = audio.len(),
            duration_ms = duration.as_millis() as u64,
            "VAD: speech ended"
        );
        Some(VadEvent::SpeechEnd { audio })
    }

    /// Drop any partial utterance and go back to silence.
    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.speech_buffer.clear();
        self.speech_frame_count = 0;
        self.silence_frame_count = 0;
        self.trailing_silence = 0;
    }
}

/// RMS energy of a PCM16 frame, normalised to `[0, 1]`.
#[must_use]
pub fn rms_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = f32::from(s) / 32_768.0;
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}
