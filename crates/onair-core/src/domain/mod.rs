//! Domain types for the show pipeline.

pub mod agent;
pub mod interrupt;
pub mod session;
pub mod speech;

pub use agent::{AgentId, Persona, PlaybackCell, PlaybackState, VoiceProfile};
pub use interrupt::{InterruptSignal, InterruptSource};
pub use session::{ConversationSession, LISTENER_SPEAKER, Turn};
pub use speech::{AudioFrame, SAMPLE_RATE, SpeechUnit, duration_to_samples, samples_to_duration};
