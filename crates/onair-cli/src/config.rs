//! Show file loading.
//!
//! One JSON document holds the show settings plus an optional `openai`
//! block for the model endpoint:
//!
//! ```json
//! {
//!   "personas": [{ "id": "ava", "name": "Ava", "systemPrompt": "...", "voice": "nova" }],
//!   "timing": { "paddingMs": 400 },
//!   "openai": { "baseUrl": "http://localhost:8080/v1", "chatModel": "llama-3.1-8b" }
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use onair_core::{ShowSettings, validate_settings};
use onair_openai::OpenAiConfig;
use serde::Deserialize;

use crate::parser::ProviderArgs;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShowFile {
    #[serde(flatten)]
    pub show: ShowSettings,
    pub openai: OpenAiConfig,
}

impl ShowFile {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("show file is not valid JSON for a show")
    }

    /// Read, parse and validate `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let file = Self::parse(&json).with_context(|| format!("in {}", path.display()))?;
        validate_settings(&file.show).with_context(|| format!("in {}", path.display()))?;
        Ok(file)
    }

    /// Command-line and environment values win over the file.
    pub fn apply_provider_overrides(&mut self, args: ProviderArgs) {
        let openai = &mut self.openai;
        if let Some(base_url) = args.base_url {
            openai.base_url = base_url;
        }
        if args.api_key.is_some() {
            openai.api_key = args.api_key;
        }
        if let Some(model) = args.chat_model {
            openai.chat_model = model;
        }
        if let Some(model) = args.speech_model {
            openai.speech_model = model;
        }
        if let Some(model) = args.transcription_model {
            openai.transcription_model = model;
        }
    }

    /// A non-empty `--encoder` replaces the file's encoder command.
    pub fn apply_encoder_override(&mut self, command: Vec<String>) {
        if !command.is_empty() {
            self.show.output.encoder_command = command;
        }
    }
}
