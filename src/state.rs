// src/state.rs
// Shared state for the relay server. The relay itself is stateless across
// requests; this only carries the HTTP client and upstream endpoints.

use reqwest::Client;

use crate::config::CONFIG;

/// Base URLs of the upstream completion APIs. Injectable so tests can point
/// the relay at local mock servers.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub xai_base_url: String,
}

impl UpstreamConfig {
    pub fn from_env() -> Self {
        Self {
            openai_base_url: CONFIG.openai_base_url.clone(),
            anthropic_base_url: CONFIG.anthropic_base_url.clone(),
            xai_base_url: CONFIG.xai_base_url.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub http: Client,
    pub upstreams: UpstreamConfig,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_upstreams(UpstreamConfig::from_env())
    }

    pub fn with_upstreams(upstreams: UpstreamConfig) -> Self {
        Self {
            http: Client::new(),
            upstreams,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
