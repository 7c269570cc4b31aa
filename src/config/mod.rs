// src/config/mod.rs
// All tunables load from the environment once, with defaults suitable for
// running everything on one machine.

use once_cell::sync::Lazy;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ChorusConfig {
    // ── Server
    pub host: String,
    pub port: u16,
    pub cors_origin: String,

    // ── Upstream completion APIs
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub xai_base_url: String,

    // ── Client side
    pub relay_url: String,
    pub synthesis_model: String,
    pub sessions_path: Option<String>,

    // ── Logging
    pub log_level: String,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            // Trim whitespace and strip inline comments before parsing
            let clean = val.split('#').next().unwrap_or("").trim();
            clean.parse::<T>().unwrap_or(default)
        }
        Err(_) => default,
    }
}

impl ChorusConfig {
    pub fn from_env() -> Self {
        // Load .env first if present; a missing file is not an error
        let _ = dotenvy::dotenv();

        Self {
            host: env_var_or("CHORUS_HOST", "127.0.0.1".to_string()),
            port: env_var_or("CHORUS_PORT", 3900),
            cors_origin: env_var_or("CHORUS_CORS_ORIGIN", "*".to_string()),
            openai_base_url: env_var_or(
                "OPENAI_BASE_URL",
                "https://api.openai.com".to_string(),
            ),
            anthropic_base_url: env_var_or(
                "ANTHROPIC_BASE_URL",
                "https://api.anthropic.com".to_string(),
            ),
            xai_base_url: env_var_or("XAI_BASE_URL", "https://api.x.ai".to_string()),
            relay_url: env_var_or("CHORUS_RELAY_URL", "http://127.0.0.1:3900".to_string()),
            synthesis_model: env_var_or("CHORUS_SYNTHESIS_MODEL", "o3-mini".to_string()),
            sessions_path: std::env::var("CHORUS_SESSIONS_PATH").ok(),
            log_level: env_var_or("CHORUS_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<ChorusConfig> = Lazy::new(ChorusConfig::from_env);
