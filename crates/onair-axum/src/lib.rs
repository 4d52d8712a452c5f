#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use error::HttpError;
pub use routes::create_router;
pub use server::serve;
pub use state::AppState;

// Integration-test-only dev-dependencies.
#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use base64 as _;
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tokio_tungstenite as _;
#[cfg(test)]
use tower as _;
