//! Single-model chat turns
//!
//! The one-lane counterpart of the fan-out: send one prompt to one model
//! through its relay endpoint, accumulate the reply, and persist the session
//! once the lane settles. A failed turn is persisted with a fixed
//! placeholder in place of the reply.

use anyhow::{Context, Result, bail};

use crate::client::{GenerationConfig, RelayClient, StreamEvent};
use crate::compare::{LaneEvent, LaneStatus, ProviderLane};
use crate::provider::{ChatMessage, provider_for_model};
use crate::session::{SessionKind, SessionStore};

/// Fixed text shown in place of a failed reply
pub const CHAT_FAILURE_PLACEHOLDER: &str =
    "Sorry, there was an error processing your request. Please check your API keys and try again.";

#[derive(Debug)]
pub struct ChatOutcome {
    pub session_id: String,
    pub reply: String,
    pub failed: bool,
}

/// Run one chat turn and persist it. `on_delta` observes each text fragment
/// as it streams in; the stored transcript only ever holds the settled turn.
pub async fn run_chat_turn(
    relay: &RelayClient,
    store: &SessionStore,
    session_id: Option<&str>,
    model: &str,
    prompt: &str,
    config: &GenerationConfig,
    mut on_delta: impl FnMut(&str),
) -> Result<ChatOutcome> {
    let provider =
        provider_for_model(model).with_context(|| format!("unknown model: {}", model))?;

    let mut messages = match session_id {
        Some(id) => {
            let session = store
                .load(id)?
                .with_context(|| format!("session {} not found", id))?;
            if session.kind != SessionKind::Single {
                bail!("session {} is not a single-model session", id);
            }
            session.messages
        }
        None => Vec::new(),
    };
    messages.push(ChatMessage::user(prompt));

    let request = config.to_request(messages.clone(), model);
    let mut lane = ProviderLane::new(model, provider);

    match relay.stream_chat(provider, &request).await {
        Ok(mut rx) => {
            let mut settled = false;
            while let Some(event) = rx.recv().await {
                match event {
                    StreamEvent::Delta(delta) => {
                        on_delta(&delta);
                        lane.apply(LaneEvent::Delta(delta));
                    }
                    StreamEvent::Done => {
                        settled = true;
                        lane.apply(LaneEvent::Closed);
                    }
                    StreamEvent::Failed(reason) => {
                        settled = true;
                        lane.apply(LaneEvent::Failed(reason));
                    }
                }
            }
            if !settled {
                lane.apply(LaneEvent::Failed("stream ended unexpectedly".into()));
            }
        }
        Err(e) => lane.apply(LaneEvent::Failed(e.to_string())),
    }

    let failed = lane.status == LaneStatus::Failed;
    let reply = lane.final_content(CHAT_FAILURE_PLACEHOLDER);
    messages.push(ChatMessage::assistant(reply.clone()));

    let session_id = match session_id {
        Some(id) => {
            store.save_messages(id, messages)?;
            id.to_string()
        }
        None => store.create_single(model, messages)?,
    };

    Ok(ChatOutcome {
        session_id,
        reply,
        failed,
    })
}
