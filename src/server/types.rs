// src/server/types.rs
// Wire types for the relay endpoints. Bodies are camelCase to match the
// browser client's layout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::{ChatMessage, Role};

/// Inclusive bounds enforced at the relay boundary
pub const TEMPERATURE_MIN: f32 = 0.0;
pub const TEMPERATURE_MAX: f32 = 2.0;
pub const MAX_TOKENS_MIN: u32 = 1;
pub const MAX_TOKENS_MAX: u32 = 4000;

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

/// Normalized streaming completion request accepted by every relay endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Validation failures reported before any upstream call is made
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("Missing messages")]
    MissingMessages,
    #[error("First message must be from user")]
    FirstMessageNotUser,
    #[error("Missing model parameter")]
    MissingModel,
    #[error("Missing systemPrompt")]
    MissingSystemPrompt,
    #[error("temperature must be within [{TEMPERATURE_MIN}, {TEMPERATURE_MAX}], got {0}")]
    TemperatureOutOfRange(f32),
    #[error("maxTokens must be within [{MAX_TOKENS_MIN}, {MAX_TOKENS_MAX}], got {0}")]
    MaxTokensOutOfRange(u32),
}

impl RelayRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.messages.is_empty() {
            return Err(RequestError::MissingMessages);
        }
        if self.messages[0].role != Role::User {
            return Err(RequestError::FirstMessageNotUser);
        }
        if self.model.trim().is_empty() {
            return Err(RequestError::MissingModel);
        }
        if self.system_prompt.trim().is_empty() {
            return Err(RequestError::MissingSystemPrompt);
        }
        if !(TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&self.temperature) {
            return Err(RequestError::TemperatureOutOfRange(self.temperature));
        }
        if !(MAX_TOKENS_MIN..=MAX_TOKENS_MAX).contains(&self.max_tokens) {
            return Err(RequestError::MaxTokensOutOfRange(self.max_tokens));
        }
        Ok(())
    }
}

/// One normalized stream frame: `data: {"content": "<delta>"}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentChunk {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
}
