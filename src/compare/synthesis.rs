//! Synthesis pass
//!
//! A second, sequential streaming request that contrasts the latest reply
//! from every lane through a single synthesizer model. The output streams
//! into a caller-supplied sink and is never persisted.

use anyhow::Result;
use tracing::warn;

use crate::client::{GenerationConfig, RelayClient, StreamEvent};
use crate::config::CONFIG;
use crate::provider::{ChatMessage, ProviderKind, provider_for_model};

/// Fixed text shown when the synthesis request fails
pub const SYNTHESIS_FAILURE_PLACEHOLDER: &str =
    "Sorry, there was an error synthesizing the responses.";

/// Fixed analysis template over the latest reply from each lane
pub fn build_synthesis_prompt(latest_replies: &[(String, String)]) -> String {
    let responses = latest_replies
        .iter()
        .map(|(model, content)| format!("{}: {}", model, content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Analyze the following AI model responses and provide a structured analysis with these sections:\n\
         \n\
         1. Comprehensive Synthesis\n\
         Combine the unique insights from each model into a coherent analysis. Focus on the main themes and how different perspectives complement each other.\n\
         \n\
         2. Notable Differences in Their Approaches\n\
         Highlight the distinct characteristics of each model's response, including differences in:\n\
         - Style and tone\n\
         - Depth of analysis\n\
         - Unique perspectives or insights\n\
         - Special features or approaches\n\
         \n\
         3. Summary of Key Points\n\
         List the main points that multiple models agreed upon, emphasizing the consensus views and shared insights.\n\
         \n\
         Format each section with clear headers and use paragraphs for readability.\n\
         \n\
         Responses:\n\
         {}",
        responses
    )
}

/// Stream a synthesis of the given replies through the configured
/// synthesizer model. On any failure the sink receives the fixed error text
/// instead; the caller always gets the full text that was shown.
pub async fn run_synthesis(
    relay: &RelayClient,
    latest_replies: &[(String, String)],
    mut sink: impl FnMut(&str),
) -> Result<String> {
    let model = CONFIG.synthesis_model.clone();
    let provider = provider_for_model(&model).unwrap_or(ProviderKind::OpenAi);

    let prompt = build_synthesis_prompt(latest_replies);
    let request = GenerationConfig::default().to_request(vec![ChatMessage::user(prompt)], &model);

    let mut rx = match relay.stream_chat(provider, &request).await {
        Ok(rx) => rx,
        Err(e) => {
            warn!("synthesis request failed: {}", e);
            sink(SYNTHESIS_FAILURE_PLACEHOLDER);
            return Ok(SYNTHESIS_FAILURE_PLACEHOLDER.to_string());
        }
    };

    let mut synthesis = String::new();
    let mut failed = false;
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Delta(delta) => {
                synthesis.push_str(&delta);
                sink(&delta);
            }
            StreamEvent::Done => {}
            StreamEvent::Failed(reason) => {
                warn!("synthesis stream failed: {}", reason);
                failed = true;
            }
        }
    }

    if failed {
        sink(SYNTHESIS_FAILURE_PLACEHOLDER);
        return Ok(SYNTHESIS_FAILURE_PLACEHOLDER.to_string());
    }
    Ok(synthesis)
}
