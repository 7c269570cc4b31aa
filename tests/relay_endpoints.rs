// tests/relay_endpoints.rs
// End-to-end relay behavior against mock upstream servers: delta
// conservation, wire-format normalization, and error forwarding.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use serde_json::json;

use chorus::core::SseDecoder;
use chorus::server::create_router;
use chorus::server::types::ContentChunk;
use chorus::state::{AppState, UpstreamConfig};

// ── Mock upstream plumbing

#[derive(Clone)]
struct MockUpstream {
    hits: Arc<AtomicUsize>,
    status: StatusCode,
    body: String,
}

async fn mock_handler(State(mock): State<MockUpstream>) -> impl IntoResponse {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    (
        mock.status,
        [(header::CONTENT_TYPE, "text/event-stream")],
        mock.body,
    )
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Mock serving both upstream families on one address
async fn spawn_upstream(status: StatusCode, body: String) -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let mock = MockUpstream {
        hits: hits.clone(),
        status,
        body,
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(mock_handler))
        .route("/v1/messages", post(mock_handler))
        .with_state(mock);
    (spawn(app).await, hits)
}

async fn spawn_relay(upstream: SocketAddr) -> SocketAddr {
    let base = format!("http://{}", upstream);
    let upstreams = UpstreamConfig {
        openai_base_url: base.clone(),
        anthropic_base_url: base.clone(),
        xai_base_url: base,
    };
    spawn(create_router(AppState::with_upstreams(upstreams))).await
}

fn openai_stream(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"delta": {"content": delta}}]})
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn anthropic_stream(deltas: &[&str]) -> String {
    let mut body = String::from(
        "event: message_start\ndata: {\"type\":\"message_start\"}\n\nevent: ping\ndata: {\"type\":\"ping\"}\n\n",
    );
    for delta in deltas {
        body.push_str(&format!(
            "event: content_block_delta\ndata: {}\n\n",
            json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": {"type": "text_delta", "text": delta},
            })
        ));
    }
    body.push_str("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
    body
}

fn request_body(model: &str) -> serde_json::Value {
    json!({
        "messages": [{"role": "user", "content": "Hi"}],
        "model": model,
        "systemPrompt": "You are a helpful assistant.",
        "temperature": 0.7,
        "maxTokens": 256,
    })
}

fn client_keys() -> String {
    json!({
        "OPENAI_API_KEY": "sk-test",
        "ANTHROPIC_API_KEY": "sk-test",
        "XAI_API_KEY": "sk-test",
    })
    .to_string()
}

/// Decode a normalized relay body into its content deltas
fn decode_deltas(body: &str) -> Vec<String> {
    let mut decoder = SseDecoder::new();
    decoder
        .push_str(body)
        .iter()
        .filter(|f| !f.is_done())
        .filter_map(|f| f.try_parse::<ContentChunk>())
        .map(|c| c.content)
        .collect()
}

// ── Tests

#[tokio::test]
async fn openai_stream_is_normalized_without_drops_or_duplicates() {
    let deltas = ["Hel", "lo", " there", "!"];
    let (upstream, hits) =
        spawn_upstream(StatusCode::OK, openai_stream(&deltas)).await;
    let relay = spawn_relay(upstream).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/openai", relay))
        .header("x-api-keys", client_keys())
        .json(&request_body("gpt-4o"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let body = response.text().await.unwrap();
    let decoded = decode_deltas(&body);

    // One normalized event per upstream delta, order preserved
    assert_eq!(decoded.len(), deltas.len());
    assert_eq!(decoded.concat(), "Hello there!");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn anthropic_envelope_is_normalized_to_the_same_framing() {
    let (upstream, _) =
        spawn_upstream(StatusCode::OK, anthropic_stream(&["Hello", " world"])).await;
    let relay = spawn_relay(upstream).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/claude", relay))
        .header("x-api-keys", client_keys())
        .json(&request_body("claude-3-5-sonnet-20241022"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let decoded = decode_deltas(&response.text().await.unwrap());
    assert_eq!(decoded, vec!["Hello", " world"]);
}

#[tokio::test]
async fn grok_endpoint_uses_openai_wire_format() {
    let (upstream, _) = spawn_upstream(StatusCode::OK, openai_stream(&["42"])).await;
    let relay = spawn_relay(upstream).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/grok", relay))
        .header("x-api-keys", client_keys())
        .json(&request_body("grok-2-latest"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let decoded = decode_deltas(&response.text().await.unwrap());
    assert_eq!(decoded, vec!["42"]);
}

#[tokio::test]
async fn validation_failure_makes_no_upstream_call() {
    let (upstream, hits) = spawn_upstream(StatusCode::OK, openai_stream(&["x"])).await;
    let relay = spawn_relay(upstream).await;

    let mut body = request_body("gpt-4o");
    body["temperature"] = json!(5.0);

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/openai", relay))
        .header("x-api-keys", client_keys())
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upstream_error_status_and_body_are_forwarded() {
    let (upstream, _) = spawn_upstream(
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"error": "upstream exploded"}"#.to_string(),
    )
    .await;
    let relay = spawn_relay(upstream).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/openai", relay))
        .header("x-api-keys", client_keys())
        .json(&request_body("gpt-4o"))
        .send()
        .await
        .unwrap();

    assert_eq!(
        response.status(),
        reqwest::StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"error": "upstream exploded"}"#
    );
}

#[tokio::test]
async fn malformed_fragments_are_skipped_not_fatal() {
    // A garbage line in the middle must not kill the rest of the stream
    let mut body = String::new();
    body.push_str(&format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {"content": "before"}}]})
    ));
    body.push_str("data: {\"choices\": [{\"delta\"\n\n");
    body.push_str(&format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {"content": "after"}}]})
    ));
    body.push_str("data: [DONE]\n\n");

    let (upstream, _) = spawn_upstream(StatusCode::OK, body).await;
    let relay = spawn_relay(upstream).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/openai", relay))
        .header("x-api-keys", client_keys())
        .json(&request_body("gpt-4o"))
        .send()
        .await
        .unwrap();

    let decoded = decode_deltas(&response.text().await.unwrap());
    assert_eq!(decoded, vec!["before", "after"]);
}
