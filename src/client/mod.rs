//! Client side of the relay
//!
//! Issues a streaming chat request against a relay endpoint and exposes the
//! normalized SSE reply as channel events, one receiver per request. This is
//! the half the browser used to own: it decodes `data: {"content": ...}`
//! frames and reports exactly one terminal event per stream.

mod keys;

pub use keys::{KeyStore, config_path};

use std::collections::HashMap;

use anyhow::Result;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::CONFIG;
use crate::core::SseDecoder;
use crate::provider::{ChatMessage, ProviderKind};
use crate::secrets;
use crate::server::types::{ContentChunk, RelayRequest};

/// Events observed on one relay stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text fragment, in upstream order
    Delta(String),
    /// The stream ended cleanly
    Done,
    /// The stream failed; no further deltas will arrive
    Failed(String),
}

/// Generation parameters shared by every lane of a request
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful assistant.".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

impl GenerationConfig {
    pub fn to_request(&self, messages: Vec<ChatMessage>, model: &str) -> RelayRequest {
        RelayRequest {
            messages,
            model: model.to_string(),
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
    /// Pre-serialized x-api-keys header value, if the caller holds local keys
    client_keys: Option<String>,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            client_keys: None,
        }
    }

    /// Client for the configured relay, forwarding any locally stored keys
    pub fn from_config() -> Self {
        Self::new(CONFIG.relay_url.clone()).with_client_keys(&KeyStore::load().as_key_map())
    }

    pub fn with_client_keys(mut self, keys: &HashMap<String, String>) -> Self {
        if keys.is_empty() {
            self.client_keys = None;
        } else {
            self.client_keys = serde_json::to_string(keys).ok();
        }
        self
    }

    /// Start a streaming chat request against one relay endpoint.
    ///
    /// Returns Err only when the request itself fails (transport error or a
    /// non-success relay status); once a stream is open, failures surface as
    /// `StreamEvent::Failed` on the channel.
    pub async fn stream_chat(
        &self,
        provider: ProviderKind,
        request: &RelayRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let url = format!("{}/api/{}", self.base_url, provider.slug());

        let mut builder = self.http.post(&url).json(request);
        if let Some(keys) = &self.client_keys {
            builder = builder.header(secrets::CLIENT_KEYS_HEADER, keys);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("relay error {}: {}", status, body);
        }

        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(StreamEvent::Failed(e.to_string())).await;
                        return;
                    }
                };

                for frame in decoder.push(&bytes) {
                    if frame.is_done() {
                        continue;
                    }
                    match frame.try_parse::<ContentChunk>() {
                        Some(chunk) => {
                            if tx.send(StreamEvent::Delta(chunk.content)).await.is_err() {
                                return;
                            }
                        }
                        None => {
                            warn!(data = %frame.preview(), "skipping unparseable relay frame")
                        }
                    }
                }
            }

            let _ = tx.send(StreamEvent::Done).await;
        });

        Ok(rx)
    }
}
