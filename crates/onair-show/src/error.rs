use onair_core::SettingsError;
use thiserror::Error;

/// Reasons a show cannot be assembled.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("a show needs at least one agent")]
    NoAgents,

    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
}
