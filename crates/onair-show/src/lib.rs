#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod agent;
pub mod error;
pub mod interrupts;
pub mod orchestrator;
pub mod text;

pub use agent::{Agent, AgentOutput, SpeakOutcome, SpeakRequest, agents_from_settings};
pub use error::BuildError;
pub use interrupts::{InterruptQueue, InterruptSender, TranscriptWait, channel as interrupt_channel};
pub use orchestrator::Orchestrator;

#[cfg(test)]
use tokio_test as _;
