//! Shared HTTP client.

use std::sync::Arc;

use reqwest::{RequestBuilder, Response};
use tracing::debug;

use crate::config::OpenAiConfig;
use crate::error::{ProviderError, ProviderResult};

/// One connection pool and configuration for every endpoint.
///
/// Cheap to clone. Implements [`TextGenerator`](onair_core::TextGenerator),
/// [`SpeechSynthesizer`](onair_core::SpeechSynthesizer) and
/// [`Transcriber`](onair_core::Transcriber).
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: Arc<OpenAiConfig>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    #[must_use]
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    pub(crate) fn post(&self, path: &str) -> (String, RequestBuilder) {
        let url = self.config.endpoint(path);
        let mut request = self.http.post(&url);
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        (url, request)
    }

    /// Send and insist on a success status, keeping the error body.
    pub(crate) async fn send(&self, url: &str, request: RequestBuilder) -> ProviderResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        debug!(url, status = status.as_u16(), "Provider rejected request");
        Err(ProviderError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body: truncate(&body, 300),
        })
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.config.base_url)
            .field("chat_model", &self.config.chat_model)
            .finish_non_exhaustive()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
