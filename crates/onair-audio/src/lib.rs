#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod bus;
pub mod codec;
pub mod error;
pub mod keepalive;
pub mod resample;
pub mod sinks;
pub mod telephony;
pub mod vad;

pub use bus::AudioBus;
pub use error::AudioError;
pub use keepalive::KeepAliveSink;
pub use resample::TELEPHONY_SAMPLE_RATE;
#[cfg(feature = "local-playback")]
pub use sinks::PreviewSink;
pub use sinks::{ChannelSink, EncoderSink};
pub use telephony::{CallHandler, CarrierCommand, CarrierEvent, TelephonyBridge};
pub use vad::{CallVad, VadConfig, VadEvent, VadState};

#[cfg(test)]
use tokio_test as _;
