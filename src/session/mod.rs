//! Local chat session log
//!
//! One JSON document holds the whole collection; every operation is a
//! synchronous read-modify-write of the entire file. Deliberately
//! last-writer-wins: the store serves a single user on a single machine and
//! concurrent writers get no consistency guarantee beyond that.

mod types;

pub use types::{ChatSession, CompareTurn, SessionKind, SessionSummary};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::config::CONFIG;
use crate::provider::ChatMessage;

pub const SINGLE_PLACEHOLDER_TITLE: &str = "New Chat";
pub const COMPARE_PLACEHOLDER_TITLE: &str = "New Comparison";

/// Title prefix taken from the first user message
const TITLE_PREFIX_CHARS: usize = 50;

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the configured path, or ~/.chorus/sessions.json
    pub fn from_config() -> Self {
        let path = CONFIG
            .sessions_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);
        Self::open(path)
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".chorus")
            .join("sessions.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── Whole-collection IO

    fn load_all(&self) -> Result<Vec<ChatSession>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    fn save_all(&self, sessions: &[ChatSession]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(sessions)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    // ── Operations

    /// Create a single-model session and return its id
    pub fn create_single(&self, model: &str, messages: Vec<ChatMessage>) -> Result<String> {
        let now = Utc::now();
        let title = messages
            .first()
            .map(|m| title_prefix(&m.content))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| SINGLE_PLACEHOLDER_TITLE.to_string());

        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            title,
            created_at: now,
            updated_at: now,
            kind: SessionKind::Single,
            model: Some(model.to_string()),
            messages,
            compare_transcript: Vec::new(),
        };
        let id = session.id.clone();

        let mut sessions = self.load_all()?;
        sessions.insert(0, session);
        self.save_all(&sessions)?;
        debug!(session = %id, "created single session");
        Ok(id)
    }

    /// Create a comparison session and return its id
    pub fn create_compare(&self, transcript: Vec<CompareTurn>) -> Result<String> {
        let now = Utc::now();
        let title = transcript
            .first()
            .and_then(|t| t.first_content())
            .map(title_prefix)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| COMPARE_PLACEHOLDER_TITLE.to_string());

        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            title,
            created_at: now,
            updated_at: now,
            kind: SessionKind::Compare,
            model: None,
            messages: Vec::new(),
            compare_transcript: transcript,
        };
        let id = session.id.clone();

        let mut sessions = self.load_all()?;
        sessions.insert(0, session);
        self.save_all(&sessions)?;
        debug!(session = %id, "created compare session");
        Ok(id)
    }

    pub fn load(&self, id: &str) -> Result<Option<ChatSession>> {
        Ok(self.load_all()?.into_iter().find(|s| s.id == id))
    }

    /// Replace a single-mode session's message transcript and persist
    pub fn save_messages(&self, id: &str, messages: Vec<ChatMessage>) -> Result<()> {
        self.mutate(id, |session| {
            if session.kind != SessionKind::Single {
                bail!("session {} is not a single-model session", session.id);
            }
            session.messages = messages;
            Ok(())
        })
    }

    /// Replace a comparison session's transcript and persist
    pub fn save_compare_transcript(&self, id: &str, transcript: Vec<CompareTurn>) -> Result<()> {
        self.mutate(id, |session| {
            if session.kind != SessionKind::Compare {
                bail!("session {} is not a comparison session", session.id);
            }
            session.compare_transcript = transcript;
            Ok(())
        })
    }

    /// Delete a session by id; false if no such id existed
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut sessions = self.load_all()?;
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        if sessions.len() == before {
            return Ok(false);
        }
        self.save_all(&sessions)?;
        Ok(true)
    }

    /// Listing for the sidebar, most recently updated first
    pub fn list_summaries(&self) -> Result<Vec<SessionSummary>> {
        let mut sessions = self.load_all()?;
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let now = Utc::now();
        Ok(sessions
            .into_iter()
            .map(|s| SessionSummary {
                relative_age: relative_age(s.updated_at, now),
                id: s.id,
                title: s.title,
            })
            .collect())
    }

    fn mutate(
        &self,
        id: &str,
        apply: impl FnOnce(&mut ChatSession) -> Result<()>,
    ) -> Result<()> {
        let mut sessions = self.load_all()?;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .with_context(|| format!("session {} not found", id))?;

        apply(session)?;
        rename_on_first_turn(session);
        bump_updated_at(session);
        self.save_all(&sessions)
    }
}

/// Replace a placeholder title once the session has real content
fn rename_on_first_turn(session: &mut ChatSession) {
    let placeholder = matches!(
        session.title.as_str(),
        SINGLE_PLACEHOLDER_TITLE | COMPARE_PLACEHOLDER_TITLE
    );
    if !placeholder {
        return;
    }
    if let Some(content) = session.first_user_content() {
        let title = title_prefix(content);
        if !title.is_empty() {
            session.title = title;
        }
    }
}

/// updatedAt must strictly increase on every persisted mutation, even when
/// two mutations land within clock resolution
fn bump_updated_at(session: &mut ChatSession) {
    let now = Utc::now();
    session.updated_at = if now > session.updated_at {
        now
    } else {
        session.updated_at + Duration::milliseconds(1)
    };
}

fn title_prefix(content: &str) -> String {
    content
        .chars()
        .take(TITLE_PREFIX_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Coarse relative timestamp for listings
pub fn relative_age(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - updated_at).num_seconds().max(0);
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{} minute{} ago", minutes, plural(minutes));
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{} hour{} ago", hours, plural(hours));
    }
    let days = hours / 24;
    format!("{} day{} ago", days, plural(days))
}

fn plural(n: i64) -> &'static str {
    if n == 1 { "" } else { "s" }
}
