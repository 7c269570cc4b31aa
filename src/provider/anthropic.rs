//! Anthropic Messages adapter
//!
//! The system prompt is a top-level field rather than a message, and
//! `max_tokens` is mandatory. The stream is an `event:`/`data:` envelope;
//! only `content_block_delta` events carrying a `text_delta` yield text.

use serde::Deserialize;
use serde_json::{Value, json};

use super::warn_unparseable;
use crate::core::SseFrame;
use crate::server::types::RelayRequest;

pub(super) fn build_request(request: &RelayRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();

    json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "system": request.system_prompt,
        "messages": messages,
        "stream": true,
    })
}

// ── Stream event envelope

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<ContentDelta>,
}

#[derive(Debug, Deserialize)]
struct ContentDelta {
    #[serde(rename = "type")]
    delta_type: Option<String>,
    text: Option<String>,
}

pub(super) fn delta_from_frame(frame: &SseFrame) -> Option<String> {
    let event: StreamEvent = match frame.try_parse() {
        Some(event) => event,
        None => {
            warn_unparseable(frame);
            return None;
        }
    };

    if event.event_type != "content_block_delta" {
        return None;
    }

    let delta = event.delta?;
    if delta.delta_type.as_deref() != Some("text_delta") {
        return None;
    }
    delta.text.filter(|text| !text.is_empty())
}
