//! xAI adapter
//!
//! Grok speaks the OpenAI-compatible Chat Completions grammar on its own
//! base URL; the stream parser is shared with the OpenAI family. No Grok
//! model id locks sampling parameters, so they are always included.

use serde_json::{Value, json};

use crate::server::types::RelayRequest;

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

    json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "stream": true,
    })
}
