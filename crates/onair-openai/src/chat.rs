//! `chat/completions`: one persona line per request.

use std::time::Instant;

use async_trait::async_trait;
use onair_core::{Operation, ShowError, TextGenerator, Turn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::OpenAiClient;
use crate::error::{ProviderError, ProviderResult};

const PATH: &str = "chat/completions";

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    /// Who said it; lets the model tell the hosts apart.
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Message names may only use `[A-Za-z0-9_-]`.
fn message_name(speaker: &str) -> String {
    speaker
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(64)
        .collect()
}

/// System prompt, then every history line as a named user message, then
/// the turn's prompt.
pub(crate) fn build_request<'a>(
    client: &'a OpenAiClient,
    system_prompt: &'a str,
    history: &'a [Turn],
    user_prompt: &'a str,
) -> ChatRequest<'a> {
    let config = client.config();
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage {
        role: "system",
        content: system_prompt,
        name: None,
    });
    messages.extend(history.iter().map(|turn| ChatMessage {
        role: "user",
        content: &turn.text,
        name: Some(message_name(&turn.speaker_id)),
    }));
    messages.push(ChatMessage {
        role: "user",
        content: user_prompt,
        name: None,
    });

    ChatRequest {
        model: &config.chat_model,
        messages,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

impl OpenAiClient {
    /// Ask the chat model for the next line.
    pub async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
        user_prompt: &str,
    ) -> ProviderResult<String> {
        let started = Instant::now();
        let body = build_request(self, system_prompt, history, user_prompt);
        let (url, request) = self.post(PATH);
        let response = self.send(&url, request.json(&body)).await?;

        let bytes = response.bytes().await?;
        let parsed: ChatResponse = serde_json::from_slice(&bytes)?;
        let text = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ProviderError::Empty(url))?;

        debug!(
            model = %self.config().chat_model,
            history = history.len(),
            chars = text.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Chat completion"
        );
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[Turn],
        user_prompt: &str,
    ) -> Result<String, ShowError> {
        self.complete(system_prompt, history, user_prompt)
            .await
            .map_err(|e| e.into_show_error(Operation::Generation))
    }
}
