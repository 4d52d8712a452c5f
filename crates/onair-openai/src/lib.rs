#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

mod chat;
mod client;
pub mod config;
pub mod error;
mod speech;
mod transcription;

pub use client::OpenAiClient;
pub use config::{DEFAULT_BASE_URL, OpenAiConfig};
pub use error::{ProviderError, ProviderResult};
pub use transcription::encode_wav;

#[cfg(test)]
use httpmock as _;
#[cfg(test)]
use tokio as _;
#[cfg(test)]
use tokio_test as _;
