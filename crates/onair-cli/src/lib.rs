#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

// Used by the binary target only.
use dotenvy as _;
use tracing_subscriber as _;

#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tokio_test as _;

pub mod bootstrap;
pub mod config;
pub mod events;
pub mod handlers;
pub mod parser;

pub use bootstrap::{OutputOptions, ShowRuntime, compose, compose_with_openai};
pub use config::ShowFile;
pub use parser::{Cli, Commands, RunArgs};
