// src/server/relay.rs
// Streaming relay: validate, resolve the credential, call upstream, and
// re-emit the provider's deltas as one normalized SSE frame each. The relay
// accumulates nothing and writes nothing — it is a pure transform.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

use super::types::{ContentChunk, RelayRequest};
use crate::provider::ProviderKind;
use crate::secrets;
use crate::state::AppState;

pub async fn openai_relay_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RelayRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    relay_stream(ProviderKind::OpenAi, state, headers, request).await
}

pub async fn claude_relay_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RelayRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    relay_stream(ProviderKind::Anthropic, state, headers, request).await
}

pub async fn grok_relay_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RelayRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    relay_stream(ProviderKind::Xai, state, headers, request).await
}

/// Request lifecycle: Validating -> AwaitingUpstream -> Streaming -> Closed,
/// with every error path terminal before the stream starts.
async fn relay_stream(
    kind: ProviderKind,
    state: AppState,
    headers: HeaderMap,
    request: RelayRequest,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    // Validating
    if let Err(e) = request.validate() {
        return Err((StatusCode::BAD_REQUEST, e.to_string()));
    }

    // AwaitingUpstream: credential, then the upstream streaming call
    let client_keys = headers
        .get(secrets::CLIENT_KEYS_HEADER)
        .and_then(|v| v.to_str().ok());
    let api_key = secrets::resolve(kind, client_keys).ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Missing {} API key", kind.display_name()),
        )
    })?;

    let body = kind.build_request(&request);
    info!(provider = kind.slug(), model = %request.model, "relaying streaming completion");

    let response = kind
        .authorize(state.http.post(kind.endpoint(&state.upstreams)), &api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                format!("Upstream request failed: {}", e),
            )
        })?;

    if !response.status().is_success() {
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let body = response.text().await.unwrap_or_default();
        error!(provider = kind.slug(), %status, "upstream error: {}", body);
        return Err((status, body));
    }

    // Streaming: one normalized event per delta, no batching
    let byte_stream = response.bytes_stream();

    let event_stream = async_stream::stream! {
        let mut parser = kind.parser();
        tokio::pin!(byte_stream);

        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for delta in parser.push(&bytes) {
                        let payload = match serde_json::to_string(&ContentChunk { content: delta }) {
                            Ok(payload) => payload,
                            Err(e) => {
                                error!("failed to encode content chunk: {}", e);
                                continue;
                            }
                        };
                        yield Ok(Event::default().data(payload));
                    }
                }
                Err(e) => {
                    // Stop emitting and let the outbound stream close cleanly
                    error!(provider = kind.slug(), "mid-stream upstream error: {}", e);
                    break;
                }
            }
        }

        debug!(provider = kind.slug(), "relay stream closed");
    };

    Ok(Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
