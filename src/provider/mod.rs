//! Provider adapters for the upstream completion APIs.
//!
//! The provider set is closed: adding an upstream family means adding a
//! variant here, not branching at call sites. Each variant knows how to
//! shape a request for its API and how to extract text deltas from its
//! streaming wire format.

mod anthropic;
mod openai;
mod xai;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{SseDecoder, SseFrame};
use crate::server::types::RelayRequest;
use crate::state::UpstreamConfig;

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Message format shared by all providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Provider dispatch
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Xai,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Xai,
    ];

    /// Route segment under /api (kept from the browser client's endpoints)
    pub fn slug(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "claude",
            ProviderKind::Xai => "grok",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Xai => "xAI",
        }
    }

    /// Environment variable (and client key-store entry) holding the credential
    pub fn env_key(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Xai => "XAI_API_KEY",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == slug)
    }

    /// Streaming completion endpoint for this family
    pub fn endpoint(&self, upstreams: &UpstreamConfig) -> String {
        match self {
            ProviderKind::OpenAi => {
                format!("{}/v1/chat/completions", upstreams.openai_base_url)
            }
            ProviderKind::Anthropic => format!("{}/v1/messages", upstreams.anthropic_base_url),
            ProviderKind::Xai => format!("{}/v1/chat/completions", upstreams.xai_base_url),
        }
    }

    /// Attach this family's auth headers to an upstream request
    pub fn authorize(
        &self,
        builder: reqwest::RequestBuilder,
        api_key: &str,
    ) -> reqwest::RequestBuilder {
        match self {
            ProviderKind::OpenAi | ProviderKind::Xai => {
                builder.header("Authorization", format!("Bearer {}", api_key))
            }
            ProviderKind::Anthropic => builder
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01"),
        }
    }

    /// Shape the upstream request body from a normalized relay request
    pub fn build_request(&self, request: &RelayRequest) -> Value {
        match self {
            ProviderKind::OpenAi => openai::build_request(request),
            ProviderKind::Anthropic => anthropic::build_request(request),
            ProviderKind::Xai => xai::build_request(request),
        }
    }

    pub fn wire_format(&self) -> WireFormat {
        match self {
            ProviderKind::OpenAi | ProviderKind::Xai => WireFormat::OpenAiChunks,
            ProviderKind::Anthropic => WireFormat::AnthropicEvents,
        }
    }

    /// Fresh incremental parser for this family's stream
    pub fn parser(&self) -> StreamParser {
        StreamParser::new(self.wire_format())
    }
}

// ============================================================================
// Stream parsing
// ============================================================================

/// On-wire event grammar of an upstream stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Bare JSON chunks on `data:` lines, terminated by `[DONE]`
    OpenAiChunks,
    /// `event:`/`data:` pairs with a typed envelope
    AnthropicEvents,
}

/// Incremental stream parser: raw bytes in, text deltas out.
///
/// Partial lines are buffered until complete; unparseable fragments are
/// logged and skipped, never fatal to the stream.
#[derive(Debug)]
pub struct StreamParser {
    format: WireFormat,
    decoder: SseDecoder,
}

impl StreamParser {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            decoder: SseDecoder::new(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut deltas = Vec::new();
        for frame in self.decoder.push(chunk) {
            if frame.is_done() {
                continue;
            }
            let delta = match self.format {
                WireFormat::OpenAiChunks => openai::delta_from_frame(&frame),
                WireFormat::AnthropicEvents => anthropic::delta_from_frame(&frame),
            };
            if let Some(delta) = delta {
                deltas.push(delta);
            }
        }
        deltas
    }
}

pub(crate) fn warn_unparseable(frame: &SseFrame) {
    tracing::warn!(data = %frame.preview(), "skipping unparseable stream fragment");
}

// ============================================================================
// Model catalog
// ============================================================================

/// A selectable model and the family that serves it
#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    pub id: &'static str,
    pub display_name: &'static str,
    pub provider: ProviderKind,
}

pub const MODELS: [ModelSpec; 4] = [
    ModelSpec {
        id: "gpt-4o",
        display_name: "GPT-4o",
        provider: ProviderKind::OpenAi,
    },
    ModelSpec {
        id: "o3-mini",
        display_name: "GPT-o3-mini",
        provider: ProviderKind::OpenAi,
    },
    ModelSpec {
        id: "claude-3-5-sonnet-20241022",
        display_name: "Claude 3.5 Sonnet",
        provider: ProviderKind::Anthropic,
    },
    ModelSpec {
        id: "grok-2-latest",
        display_name: "Grok 2",
        provider: ProviderKind::Xai,
    },
];

pub fn model_spec(id: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.id == id)
}

/// Which family serves a model id, if it is in the catalog
pub fn provider_for_model(id: &str) -> Option<ProviderKind> {
    model_spec(id).map(|m| m.provider)
}
