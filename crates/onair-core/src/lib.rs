#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod settings;

pub use domain::{
    AgentId, AudioFrame, ConversationSession, InterruptSignal, InterruptSource, LISTENER_SPEAKER,
    Persona, PlaybackCell, PlaybackState, SAMPLE_RATE, SpeechUnit, Turn, VoiceProfile,
    duration_to_samples, samples_to_duration,
};
pub use error::{ErrorKind, FailureKind, Operation, ShowError};
pub use events::{ShowEvent, TurnOutcome, TurnReason};
pub use ports::{
    AudioSink, ChannelEmitter, InterruptPublisher, NoopEmitter, ShowEventEmitter, SinkError,
    SpeechSynthesizer, TextGenerator, Transcriber,
};
pub use settings::{
    AdLibSettings, AgentSettings, OutputSettings, PAYLOAD_PLACEHOLDER, PersonaConfig,
    PromptTemplates, SettingsError, ShowSettings, TelephonySettings, TimingSettings,
    validate_settings,
};

#[cfg(test)]
use tokio_test as _;
