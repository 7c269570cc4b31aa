//! OpenAI Chat Completions adapter
//!
//! Request shaping and stream-chunk parsing for the OpenAI API. The system
//! prompt rides as the leading `system` message. Reasoning model ids reject
//! sampling-parameter overrides outright, so those are omitted for them
//! rather than letting upstream reject the whole call.

use serde::Deserialize;
use serde_json::{Value, json};

use super::warn_unparseable;
use crate::core::SseFrame;
use crate::server::types::RelayRequest;

/// Model id prefixes whose endpoints reject `temperature`/`max_tokens`
const SAMPLING_LOCKED_PREFIXES: [&str; 3] = ["o1", "o3", "o4"];

pub(super) fn sampling_locked(model: &str) -> bool {
    SAMPLING_LOCKED_PREFIXES
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

pub(super) fn build_request(request: &RelayRequest) -> Value {
    let mut messages = vec![json!({
        "role": "system",
        "content": request.system_prompt,
    })];
    messages.extend(
        request
            .messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content})),
    );

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "stream": true,
    });
    if !sampling_locked(&request.model) {
        body["temperature"] = json!(request.temperature);
        body["max_tokens"] = json!(request.max_tokens);
    }
    body
}

// ── Stream chunk grammar: {"choices":[{"delta":{"content":"..."}}]}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

pub(super) fn delta_from_frame(frame: &SseFrame) -> Option<String> {
    let chunk: ChatCompletionChunk = match frame.try_parse() {
        Some(chunk) => chunk,
        None => {
            warn_unparseable(frame);
            return None;
        }
    };

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
}
