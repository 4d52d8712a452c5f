//! Per-call inbound state: codec failure tracking and caller VAD.

use onair_core::{TelephonySettings, duration_to_samples};

use super::carrier::decode_payload;
use crate::codec;
use crate::resample::TELEPHONY_SAMPLE_RATE;
use crate::vad::{CallVad, VadConfig, VadEvent, VadState};

/// What happened to one inbound media payload.
#[derive(Debug, PartialEq, Eq)]
pub enum MediaOutcome {
    /// Decoded caller audio (8 kHz PCM16) and any VAD events it completed.
    Audio {
        pcm: Vec<i16>,
        events: Vec<VadEvent>,
    },
    /// The payload was undecodable and has been dropped.
    Dropped,
    /// Too many consecutive undecodable payloads; the call should end.
    EndCall,
}

/// Inbound state of one call. Created on `start`, dropped on `stop`.
#[derive(Debug)]
pub struct CallSession {
    stream_id: String,
    vad: CallVad,
    /// Decoded samples not yet filling a whole VAD frame.
    pending: Vec<i16>,
    frame_samples: usize,
    codec_failures: u32,
    max_codec_failures: u32,
}

impl CallSession {
    #[must_use]
    pub fn new(stream_id: impl Into<String>, settings: &TelephonySettings) -> Self {
        Self {
            stream_id: stream_id.into(),
            vad: CallVad::new(VadConfig::from_settings(settings, TELEPHONY_SAMPLE_RATE)),
            pending: Vec::new(),
            frame_samples: duration_to_samples(settings.frame(), TELEPHONY_SAMPLE_RATE).max(1),
            codec_failures: 0,
            max_codec_failures: settings.max_codec_failures,
        }
    }

    #[must_use]
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    #[must_use]
    pub const fn vad_state(&self) -> VadState {
        self.vad.state()
    }

    #[must_use]
    pub const fn codec_failures(&self) -> u32 {
        self.codec_failures
    }

    /// Decode one base64 mu-law payload and run VAD over the whole frames it
    /// completes.
    pub fn ingest(&mut self, payload: &str) -> MediaOutcome {
        let bytes = match decode_payload(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.codec_failures += 1;
                tracing::warn!(
                    stream_id = %self.stream_id,
                    failures = self.codec_failures,
                    error = %e,
                    "Dropping undecodable media frame"
                );
                if self.codec_failures >= self.max_codec_failures {
                    return MediaOutcome::EndCall;
                }
                return MediaOutcome::Dropped;
            }
        };
        self.codec_failures = 0;

        let pcm = codec::decode(&bytes);
        self.pending.extend_from_slice(&pcm);

        let mut events = Vec::new();
        let mut offset = 0;
        while self.pending.len() - offset >= self.frame_samples {
            let frame = &self.pending[offset..offset + self.frame_samples];
            if let Some(event) = self.vad.process_frame(frame) {
                events.push(event);
            }
            offset += self.frame_samples;
        }
        self.pending.drain(..offset);

        MediaOutcome::Audio { pcm, events }
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    use super::*;

    fn payload(sample: i16, count: usize) -> String {
        STANDARD.encode(codec::encode(&vec![sample; count]))
    }

    fn settings() -> TelephonySettings {
        TelephonySettings {
            max_codec_failures: 3,
            ..TelephonySettings::default()
        }
    }

    #[test]
    fn third_loud_frame_reports_speech_start() {
        let mut call = CallSession::new("MZ1", &settings());
        let loud = payload(8_000, 160);

        for _ in 0..2 {
            let MediaOutcome::Audio { events, .. } = call.ingest(&loud) else {
                panic!("expected audio");
            };
            assert!(events.is_empty());
        }
        let MediaOutcome::Audio { events, pcm } = call.ingest(&loud) else {
            panic!("expected audio");
        };
        assert_eq!(events, vec![VadEvent::SpeechStart]);
        assert_eq!(pcm.len(), 160);
        assert_eq!(call.vad_state(), VadState::Speaking);
    }

    #[test]
    fn partial_frames_are_carried_over() {
        let mut call = CallSession::new("MZ1", &settings());
        // 3 x 100 samples = 300 samples = one whole frame plus change.
        for _ in 0..3 {
            call.ingest(&payload(8_000, 100));
        }
        assert_eq!(call.vad_state(), VadState::SpeechStarting);
    }

    #[test]
    fn consecutive_codec_failures_end_the_call() {
        let mut call = CallSession::new("MZ1", &settings());
        assert_eq!(call.ingest("!!!"), MediaOutcome::Dropped);
        assert_eq!(call.ingest("!!!"), MediaOutcome::Dropped);
        assert_eq!(call.ingest("!!!"), MediaOutcome::EndCall);
    }

    #[test]
    fn good_frame_resets_failure_count() {
        let mut call = CallSession::new("MZ1", &settings());
        call.ingest("!!!");
        call.ingest("!!!");
        assert!(matches!(call.ingest(&payload(0, 160)), MediaOutcome::Audio { .. }));
        assert_eq!(call.codec_failures(), 0);
        assert_eq!(call.ingest("!!!"), MediaOutcome::Dropped);
    }
}
