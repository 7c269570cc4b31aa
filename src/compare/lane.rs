// src/compare/lane.rs
// One provider's track within a fan-out turn. A lane only changes through
// apply(), and a terminal lane never changes again.

use tracing::{debug, warn};

use crate::provider::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneStatus {
    Pending,
    Streaming,
    Done,
    Failed,
}

/// The only transitions a lane understands
#[derive(Debug, Clone)]
pub enum LaneEvent {
    Delta(String),
    Closed,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ProviderLane {
    pub model: String,
    pub provider: ProviderKind,
    pub text: String,
    pub status: LaneStatus,
}

impl ProviderLane {
    pub fn new(model: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            model: model.into(),
            provider,
            text: String::new(),
            status: LaneStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, LaneStatus::Done | LaneStatus::Failed)
    }

    pub fn apply(&mut self, event: LaneEvent) {
        if self.is_terminal() {
            debug!(model = %self.model, "ignoring event for settled lane");
            return;
        }
        match event {
            LaneEvent::Delta(delta) => {
                self.status = LaneStatus::Streaming;
                self.text.push_str(&delta);
            }
            LaneEvent::Closed => {
                self.status = LaneStatus::Done;
            }
            LaneEvent::Failed(reason) => {
                warn!(model = %self.model, reason = %reason, "lane failed");
                self.status = LaneStatus::Failed;
            }
        }
    }

    /// Accumulated text, or the caller's placeholder for a failed lane
    pub fn final_content(&self, failure_placeholder: &str) -> String {
        match self.status {
            LaneStatus::Failed => failure_placeholder.to_string(),
            _ => self.text.clone(),
        }
    }
}
