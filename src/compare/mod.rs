//! Fan-out orchestration
//!
//! Broadcasts one user message to up to four provider lanes, accumulates
//! each relay stream independently, and folds the lanes into a persisted
//! comparison turn only after every lane has settled. In-flight state never
//! reaches the session store.

mod lane;
pub mod synthesis;

pub use lane::{LaneEvent, LaneStatus, ProviderLane};

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::client::{GenerationConfig, RelayClient, StreamEvent};
use crate::provider::{ChatMessage, ProviderKind, provider_for_model};
use crate::session::{CompareTurn, SessionKind, SessionStore};

/// Fixed text shown in place of a failed lane's reply
pub const LANE_FAILURE_PLACEHOLDER: &str =
    "Sorry, there was an error processing your request.";

pub const MAX_LANES: usize = 4;

/// Result of one settled fan-out turn
#[derive(Debug)]
pub struct CompareOutcome {
    pub session_id: String,
    pub lanes: Vec<ProviderLane>,
}

impl CompareOutcome {
    /// Latest reply per lane, as fed to the synthesis step
    pub fn latest_replies(&self) -> Vec<(String, String)> {
        self.lanes
            .iter()
            .map(|lane| {
                (
                    lane.model.clone(),
                    lane.final_content(LANE_FAILURE_PLACEHOLDER),
                )
            })
            .collect()
    }
}

/// Broadcast one prompt to the selected models and persist the merged turn
/// once every lane is done or failed.
///
/// `on_update` observes every lane transition for incremental display; it
/// runs on the orchestrator's task, so lanes never block one another on it.
pub async fn run_compare_turn(
    relay: &RelayClient,
    store: &SessionStore,
    session_id: Option<&str>,
    models: &[String],
    prompt: &str,
    config: &GenerationConfig,
    mut on_update: impl FnMut(usize, &ProviderLane),
) -> Result<CompareOutcome> {
    if models.is_empty() || models.len() > MAX_LANES {
        bail!(
            "comparison needs between 1 and {} models, got {}",
            MAX_LANES,
            models.len()
        );
    }

    // Prior transcript when resuming a saved comparison
    let mut transcript: Vec<CompareTurn> = match session_id {
        Some(id) => {
            let session = store
                .load(id)?
                .with_context(|| format!("session {} not found", id))?;
            if session.kind != SessionKind::Compare {
                bail!("session {} is not a comparison session", id);
            }
            session.compare_transcript
        }
        None => Vec::new(),
    };

    let mut lanes = Vec::with_capacity(models.len());
    for model in models {
        let provider = provider_for_model(model)
            .with_context(|| format!("unknown model: {}", model))?;
        lanes.push(ProviderLane::new(model.clone(), provider));
    }

    // The user message lands in every lane's visible transcript up front
    let user_turn = CompareTurn::user(models, prompt);
    for (idx, lane) in lanes.iter().enumerate() {
        on_update(idx, lane);
    }

    // Start every lane before awaiting any of them
    let (tx, mut rx) = mpsc::channel::<(usize, LaneEvent)>(256);
    for (idx, lane) in lanes.iter().enumerate() {
        let mut messages = lane_history(&transcript, &lane.model);
        messages.push(ChatMessage::user(prompt));
        let request = config.to_request(messages, &lane.model);

        let relay = relay.clone();
        let provider = lane.provider;
        let tx = tx.clone();
        tokio::spawn(async move { run_lane(relay, provider, request, idx, tx).await });
    }
    drop(tx);

    info!(lanes = lanes.len(), "fan-out started");

    // Accumulate interleaved lane events until every sender is gone
    while let Some((idx, event)) = rx.recv().await {
        lanes[idx].apply(event);
        on_update(idx, &lanes[idx]);
    }

    // A lane whose task died without a terminal event counts as failed
    for (idx, lane) in lanes.iter_mut().enumerate() {
        if !lane.is_terminal() {
            lane.apply(LaneEvent::Failed("stream ended unexpectedly".into()));
            on_update(idx, lane);
        }
    }

    // Fold and persist, only now that every lane has settled
    let mut replies = BTreeMap::new();
    for lane in &lanes {
        replies.insert(
            lane.model.clone(),
            lane.final_content(LANE_FAILURE_PLACEHOLDER),
        );
    }
    transcript.push(user_turn);
    transcript.push(CompareTurn::assistant(replies));

    let session_id = match session_id {
        Some(id) => {
            store.save_compare_transcript(id, transcript)?;
            id.to_string()
        }
        None => store.create_compare(transcript)?,
    };
    debug!(session = %session_id, "comparison turn persisted");

    Ok(CompareOutcome { session_id, lanes })
}

/// One lane's task: open the relay stream and forward events to the
/// orchestrator. A failure here never touches any other lane.
async fn run_lane(
    relay: RelayClient,
    provider: ProviderKind,
    request: crate::server::types::RelayRequest,
    idx: usize,
    tx: mpsc::Sender<(usize, LaneEvent)>,
) {
    let mut rx = match relay.stream_chat(provider, &request).await {
        Ok(rx) => rx,
        Err(e) => {
            let _ = tx.send((idx, LaneEvent::Failed(e.to_string()))).await;
            return;
        }
    };

    let mut settled = false;
    while let Some(event) = rx.recv().await {
        let lane_event = match event {
            StreamEvent::Delta(delta) => LaneEvent::Delta(delta),
            StreamEvent::Done => {
                settled = true;
                LaneEvent::Closed
            }
            StreamEvent::Failed(reason) => {
                settled = true;
                LaneEvent::Failed(reason)
            }
        };
        if tx.send((idx, lane_event)).await.is_err() {
            return;
        }
    }

    if !settled {
        // Stream channel closed without a terminal event
        let _ = tx
            .send((idx, LaneEvent::Failed("stream ended unexpectedly".into())))
            .await;
    }
}

/// A model's own message history reconstructed from the shared transcript.
/// Lanes that never answered a turn contribute nothing for it.
fn lane_history(transcript: &[CompareTurn], model: &str) -> Vec<ChatMessage> {
    transcript
        .iter()
        .filter_map(|turn| {
            let content = turn.content_for(model);
            if content.is_empty() {
                return None;
            }
            Some(ChatMessage {
                role: turn.role,
                content: content.to_string(),
            })
        })
        .collect()
}
