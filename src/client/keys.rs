//! Client-side key store (~/.chorus/config.toml)
//!
//! Keys stored here are forwarded to the relay in the x-api-keys header,
//! where they act as the fallback behind server-side environment values.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::provider::ProviderKind;

#[derive(Debug, Default, Deserialize)]
pub struct KeyStore {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub xai_api_key: Option<String>,
}

impl KeyStore {
    /// Load from ~/.chorus/config.toml; missing or unreadable files are not errors
    pub fn load() -> Self {
        let path = config_path();

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(store) => store,
                Err(e) => {
                    tracing::warn!("failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Keys present in the store, keyed the way the resolver expects them
    pub fn as_key_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        let entries = [
            (ProviderKind::OpenAi, &self.openai_api_key),
            (ProviderKind::Anthropic, &self.anthropic_api_key),
            (ProviderKind::Xai, &self.xai_api_key),
        ];
        for (kind, value) in entries {
            if let Some(key) = value.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
                map.insert(kind.env_key().to_string(), key.to_string());
            }
        }
        map
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".chorus")
        .join("config.toml")
}
