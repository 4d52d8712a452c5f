//! Show settings and validation.
//!
//! Every field has a default so a settings file only needs to name what it
//! changes. Times are stored as milliseconds for readable JSON and exposed as
//! [`Duration`]s through accessors.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AgentId, Persona, VoiceProfile};

/// Placeholder substituted by [`PromptTemplates::render`].
pub const PAYLOAD_PLACEHOLDER: &str = "{payload}";

/// Top-level configuration of one show.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShowSettings {
    pub timing: TimingSettings,
    pub agent: AgentSettings,
    pub ad_lib: AdLibSettings,
    pub telephony: TelephonySettings,
    pub output: OutputSettings,
    pub prompts: PromptTemplates,
    pub personas: Vec<PersonaConfig>,
    /// Turns of history handed to the model; `None` keeps everything.
    pub history_limit: Option<usize>,
}

// ── Timing ─────────────────────────────────────────────────────────

/// Playback pacing and watchdogs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingSettings {
    /// Interrupt poll interval while audio plays.
    pub poll_interval_ms: u64,
    /// How long before a sentence ends the next one is queued.
    pub overlap_ms: u64,
    /// Silence written when the next unit is late.
    pub padding_ms: u64,
    /// Size of the audio chunks pushed to the bus.
    pub chunk_ms: u64,
    /// Watchdog for a single turn, from selection to last sentence.
    pub max_turn_ms: u64,
    /// How long a caller reply waits for the transcript.
    pub caller_transcript_timeout_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            overlap_ms: 120,
            padding_ms: 250,
            chunk_ms: 100,
            max_turn_ms: 90_000,
            caller_transcript_timeout_ms: 8_000,
        }
    }
}

impl TimingSettings {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn overlap(&self) -> Duration {
        Duration::from_millis(self.overlap_ms)
    }

    #[must_use]
    pub const fn padding(&self) -> Duration {
        Duration::from_millis(self.padding_ms)
    }

    #[must_use]
    pub const fn chunk(&self) -> Duration {
        Duration::from_millis(self.chunk_ms)
    }

    #[must_use]
    pub const fn max_turn(&self) -> Duration {
        Duration::from_millis(self.max_turn_ms)
    }

    #[must_use]
    pub const fn caller_transcript_timeout(&self) -> Duration {
        Duration::from_millis(self.caller_transcript_timeout_ms)
    }
}

// ── Agent ──────────────────────────────────────────────────────────

/// Retry, timeout and fallback behaviour shared by every agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentSettings {
    /// Retries after the first attempt, per call.
    pub max_retries: u32,
    /// Base backoff between attempts (doubled each retry).
    pub retry_backoff_ms: u64,
    pub generation_timeout_ms: u64,
    pub synthesis_timeout_ms: u64,
    /// Sentences synthesized concurrently (playback order is preserved).
    pub synthesis_parallelism: usize,
    /// Spoken when generation or synthesis gives up.
    pub fallback_text: String,
    /// Capacity of the agent → orchestrator channel.
    pub unit_buffer: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_backoff_ms: 250,
            generation_timeout_ms: 20_000,
            synthesis_timeout_ms: 20_000,
            synthesis_parallelism: 2,
            fallback_text: "Bear with us, we're having a little trouble on the line.".to_string(),
            unit_buffer: 16,
        }
    }
}

impl AgentSettings {
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    #[must_use]
    pub const fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    #[must_use]
    pub const fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }
}

// ── Ad-lib ─────────────────────────────────────────────────────────

/// Peer interjections. Off unless explicitly enabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdLibSettings {
    pub enabled: bool,
    /// Chance per poll tick, in `[0, 1]`.
    pub probability: f64,
}

impl AdLibSettings {
    /// Whether any roll can succeed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.probability > 0.0
    }
}

// ── Telephony ──────────────────────────────────────────────────────

/// Caller-side VAD and codec tolerances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelephonySettings {
    /// RMS (normalised to `[0, 1]`) above which a frame counts as speech.
    pub vad_threshold: f32,
    /// Consecutive loud frames before speech is confirmed.
    pub speech_start_frames: u32,
    /// Consecutive quiet frames before speech is considered over.
    pub speech_end_frames: u32,
    /// Shorter segments are discarded as noise.
    pub min_segment_ms: u64,
    /// Frame length for VAD and the outbound keep-alive pump.
    pub frame_ms: u64,
    /// Linear gain applied to caller audio before broadcast.
    pub inbound_gain: f32,
    /// Consecutive undecodable media frames that end a call.
    pub max_codec_failures: u32,
}

impl Default for TelephonySettings {
    fn default() -> Self {
        Self {
            vad_threshold: 0.02,
            speech_start_frames: 3,
            speech_end_frames: 40,
            min_segment_ms: 500,
            frame_ms: 20,
            inbound_gain: 2.0,
            max_codec_failures: 50,
        }
    }
}

impl TelephonySettings {
    #[must_use]
    pub const fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }

    #[must_use]
    pub const fn min_segment(&self) -> Duration {
        Duration::from_millis(self.min_segment_ms)
    }
}

// ── Outputs ────────────────────────────────────────────────────────

/// Bus and encoder-process behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputSettings {
    /// Frames a sink may have queued before new frames are dropped for it.
    pub sink_queue_capacity: usize,
    /// Encoder command line (program followed by arguments). Empty disables it.
    pub encoder_command: Vec<String>,
    /// Silence cadence for the encoder when nothing is playing.
    pub keepalive_interval_ms: u64,
    /// Grace period for the encoder to exit after stdin closes.
    pub shutdown_timeout_ms: u64,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            sink_queue_capacity: 256,
            encoder_command: Vec::new(),
            keepalive_interval_ms: 100,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl OutputSettings {
    #[must_use]
    pub const fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

// ── Prompts ────────────────────────────────────────────────────────

/// User prompts for each kind of turn. `{payload}` is replaced by the
/// interrupt's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromptTemplates {
    pub rotation: String,
    pub breaking_news: String,
    pub listener: String,
    pub trend: String,
    pub ad_lib: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            rotation: "Continue the conversation with one or two short sentences.".to_string(),
            breaking_news: "Breaking news just came in: \"{payload}\". Announce it to the \
                            listeners in your own voice."
                .to_string(),
            listener: "A listener says: \"{payload}\". Respond to them directly.".to_string(),
            trend: "This is trending right now: \"{payload}\". React to it briefly.".to_string(),
            ad_lib: "Jump in with a very short reaction to what was just said.".to_string(),
        }
    }
}

impl PromptTemplates {
    /// Substitute `payload` into `template`.
    #[must_use]
    pub fn render(template: &str, payload: &str) -> String {
        template.replace(PAYLOAD_PLACEHOLDER, payload)
    }
}

// ── Personas ───────────────────────────────────────────────────────

/// One on-air persona as written in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaConfig {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
    pub voice: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

const fn default_speed() -> f32 {
    1.0
}

impl PersonaConfig {
    #[must_use]
    pub fn agent_id(&self) -> AgentId {
        AgentId::new(self.id.clone())
    }

    #[must_use]
    pub fn persona(&self) -> Persona {
        Persona {
            name: self.name.clone(),
            system_prompt: self.system_prompt.clone(),
        }
    }

    #[must_use]
    pub fn voice_profile(&self) -> VoiceProfile {
        VoiceProfile {
            voice: self.voice.clone(),
            speed: self.speed,
        }
    }
}

// ── Validation ─────────────────────────────────────────────────────

/// Errors that can occur during settings validation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SettingsError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("At least one persona is required")]
    NoPersonas,

    #[error("Duplicate persona id: {0}")]
    DuplicatePersona(String),

    #[error("Persona '{0}' has an empty voice")]
    EmptyVoice(String),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

/// Validate a settings value before a show is built from it.
pub fn validate_settings(settings: &ShowSettings) -> Result<(), SettingsError> {
    let timing = &settings.timing;
    if timing.poll_interval_ms == 0 {
        return Err(invalid("timing.pollIntervalMs", "must be greater than zero"));
    }
    if timing.chunk_ms == 0 {
        return Err(invalid("timing.chunkMs", "must be greater than zero"));
    }
    if timing.max_turn_ms < timing.poll_interval_ms {
        return Err(invalid(
            "timing.maxTurnMs",
            "must be at least one poll interval",
        ));
    }

    let agent = &settings.agent;
    if agent.synthesis_parallelism == 0 {
        return Err(invalid("agent.synthesisParallelism", "must be at least 1"));
    }
    if agent.unit_buffer == 0 {
        return Err(invalid("agent.unitBuffer", "must be at least 1"));
    }
    if agent.generation_timeout_ms == 0 || agent.synthesis_timeout_ms == 0 {
        return Err(invalid("agent", "timeouts must be greater than zero"));
    }
    if agent.fallback_text.trim().is_empty() {
        return Err(invalid("agent.fallbackText", "must not be empty"));
    }

    if !(0.0..=1.0).contains(&settings.ad_lib.probability) {
        return Err(invalid("adLib.probability", "must be within [0, 1]"));
    }

    let telephony = &settings.telephony;
    if !(0.0..=1.0).contains(&telephony.vad_threshold) {
        return Err(invalid("telephony.vadThreshold", "must be within [0, 1]"));
    }
    if telephony.speech_start_frames == 0 || telephony.speech_end_frames == 0 {
        return Err(invalid("telephony", "frame counts must be at least 1"));
    }
    if telephony.frame_ms == 0 {
        return Err(invalid("telephony.frameMs", "must be greater than zero"));
    }
    if telephony.inbound_gain <= 0.0 {
        return Err(invalid("telephony.inboundGain", "must be positive"));
    }
    if telephony.max_codec_failures == 0 {
        return Err(invalid("telephony.maxCodecFailures", "must be at least 1"));
    }

    if settings.output.sink_queue_capacity == 0 {
        return Err(invalid("output.sinkQueueCapacity", "must be at least 1"));
    }

    if settings.personas.is_empty() {
        return Err(SettingsError::NoPersonas);
    }
    let mut seen = HashSet::new();
    for persona in &settings.personas {
        if !seen.insert(persona.id.as_str()) {
            return Err(SettingsError::DuplicatePersona(persona.id.clone()));
        }
        if persona.voice.trim().is_empty() {
            return Err(SettingsError::EmptyVoice(persona.id.clone()));
        }
    }

    Ok(())
}
