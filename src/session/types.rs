// src/session/types.rs
// Persisted session records. The on-disk layout keeps the browser-era
// collection shape: camelCase fields, whole collection in one document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::{ChatMessage, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Single,
    Compare,
}

/// One turn of a comparison: the same role across every active model, with
/// per-model content. User turns broadcast identical text; assistant turns
/// are independent and may hold a failure placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareTurn {
    pub role: Role,
    pub content_by_provider: BTreeMap<String, String>,
}

impl CompareTurn {
    /// A user turn broadcasting one prompt to every listed model
    pub fn user(models: &[String], content: &str) -> Self {
        Self {
            role: Role::User,
            content_by_provider: models
                .iter()
                .map(|m| (m.clone(), content.to_string()))
                .collect(),
        }
    }

    pub fn assistant(content_by_provider: BTreeMap<String, String>) -> Self {
        Self {
            role: Role::Assistant,
            content_by_provider,
        }
    }

    /// Content for one model's lane, empty if that lane never answered
    pub fn content_for(&self, model: &str) -> &str {
        self.content_by_provider
            .get(model)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Any lane's content; user turns hold the same text in every lane
    pub fn first_content(&self) -> Option<&str> {
        self.content_by_provider.values().next().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    /// Model id, single mode only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compare_transcript: Vec<CompareTurn>,
}

impl ChatSession {
    /// First user-authored content in the transcript, if any exists yet
    pub fn first_user_content(&self) -> Option<&str> {
        match self.kind {
            SessionKind::Single => self
                .messages
                .iter()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.as_str()),
            SessionKind::Compare => self
                .compare_transcript
                .iter()
                .find(|t| t.role == Role::User)
                .and_then(|t| t.first_content()),
        }
    }
}

/// Sidebar-style listing entry
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub relative_age: String,
}
