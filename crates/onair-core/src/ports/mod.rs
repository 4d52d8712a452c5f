//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports are the seams between the show logic and the outside world. They
//! carry no transport details: `onair-openai` implements the collaborator
//! ports over HTTP, `onair-audio` implements [`AudioSink`] for each output,
//! and tests implement all of them with in-memory mocks.

mod audio_sink;
mod event_emitter;
mod generation;
mod interrupts;
mod synthesis;
mod transcription;

pub use audio_sink::{AudioSink, SinkError};
pub use event_emitter::{ChannelEmitter, NoopEmitter, ShowEventEmitter};
pub use generation::TextGenerator;
pub use interrupts::InterruptPublisher;
pub use synthesis::SpeechSynthesizer;
pub use transcription::Transcriber;
