//! Credential resolution: server environment first, then the caller's
//! `x-api-keys` header (a JSON map keyed by the same names the environment
//! uses). Absence is a value, not an error — the relay turns it into its
//! missing-credential outcome.

use std::collections::HashMap;

use crate::provider::ProviderKind;

/// Header carrying client-side keys, forwarded from the caller's local store
pub const CLIENT_KEYS_HEADER: &str = "x-api-keys";

pub fn resolve(provider: ProviderKind, client_keys: Option<&str>) -> Option<String> {
    if let Ok(key) = std::env::var(provider.env_key()) {
        let key = key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }

    let raw = client_keys?;
    match serde_json::from_str::<HashMap<String, String>>(raw) {
        Ok(map) => map
            .get(provider.env_key())
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string),
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse client api key header");
            None
        }
    }
}
