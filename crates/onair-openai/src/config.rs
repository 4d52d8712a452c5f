//! Endpoint and model configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default API root; any OpenAI-compatible server works.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Where to send requests and which models to ask for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpenAiConfig {
    /// API root without a trailing slash, e.g. `http://localhost:8080/v1`.
    pub base_url: String,
    /// Bearer token. Local servers usually need none.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub chat_model: String,
    pub speech_model: String,
    pub transcription_model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Hard ceiling for one HTTP exchange. The agent applies its own,
    /// usually tighter, per-operation timeouts on top.
    pub request_timeout_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            chat_model: "gpt-4o-mini".to_string(),
            speech_model: "gpt-4o-mini-tts".to_string(),
            transcription_model: "whisper-1".to_string(),
            temperature: Some(0.9),
            max_tokens: Some(200),
            request_timeout_ms: 60_000,
        }
    }
}

impl OpenAiConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Full URL for an API path such as `chat/completions`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
