// tests/chat_turn.rs
// Single-model turns through a real relay backed by a mock upstream.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use serde_json::json;
use tempfile::TempDir;

use chorus::chat::{CHAT_FAILURE_PLACEHOLDER, run_chat_turn};
use chorus::client::{GenerationConfig, RelayClient};
use chorus::provider::Role;
use chorus::server::create_router;
use chorus::session::{SessionKind, SessionStore};
use chorus::state::{AppState, UpstreamConfig};

#[derive(Clone)]
struct MockUpstream {
    status: StatusCode,
    body: String,
}

async fn mock_handler(State(mock): State<MockUpstream>) -> impl IntoResponse {
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

async fn spawn_stack(status: StatusCode, body: String) -> RelayClient {
    let upstream = spawn(
        Router::new()
            .route("/v1/chat/completions", post(mock_handler))
            .with_state(MockUpstream { status, body }),
    )
    .await;

    let base = format!("http://{}", upstream);
    let relay = spawn(create_router(AppState::with_upstreams(UpstreamConfig {
        openai_base_url: base.clone(),
        anthropic_base_url: base.clone(),
        xai_base_url: base,
    })))
    .await;

    let keys: HashMap<String, String> =
        [("OPENAI_API_KEY".to_string(), "sk-test".to_string())].into();
    RelayClient::new(format!("http://{}", relay)).with_client_keys(&keys)
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

#[tokio::test]
async fn successful_turn_streams_and_persists() {
    let relay = spawn_stack(StatusCode::OK, openai_stream(&["Hi", " there"])).await;
    let dir = TempDir::new().unwrap();
    let store = SessionStore::open(dir.path().join("sessions.json"));

    let mut streamed = String::new();
    let outcome = run_chat_turn(
        &relay,
        &store,
        None,
        "gpt-4o",
        "Hello?",
        &GenerationConfig::default(),
        |delta| streamed.push_str(delta),
    )
    .await
    .unwrap();

    assert!(!outcome.failed);
    assert_eq!(outcome.reply, "Hi there");
    assert_eq!(streamed, "Hi there");

    let session = store.load(&outcome.session_id).unwrap().unwrap();
    assert_eq!(session.kind, SessionKind::Single);
    assert_eq!(session.model.as_deref(), Some("gpt-4o"));
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].role, Role::User);
    assert_eq!(session.messages[0].content, "Hello?");
    assert_eq!(session.messages[1].role, Role::Assistant);
    assert_eq!(session.messages[1].content, "Hi there");
    assert_eq!(session.title, "Hello?");
}

#[tokio::test]
async fn failed_turn_persists_placeholder_reply() {
    let relay = spawn_stack(
        StatusCode::INTERNAL_SERVER_ERROR,
        "upstream exploded".to_string(),
    )
    .await;
    let dir = TempDir::new().unwrap();
    let store = SessionStore::open(dir.path().join("sessions.json"));

    let outcome = run_chat_turn(
        &relay,
        &store,
        None,
        "gpt-4o",
        "Hello?",
        &GenerationConfig::default(),
        |_| {},
    )
    .await
    .unwrap();

    assert!(outcome.failed);
    assert_eq!(outcome.reply, CHAT_FAILURE_PLACEHOLDER);

    let session = store.load(&outcome.session_id).unwrap().unwrap();
    assert_eq!(session.messages[1].content, CHAT_FAILURE_PLACEHOLDER);
}

#[tokio::test]
async fn follow_up_turn_extends_the_same_session() {
    let relay = spawn_stack(StatusCode::OK, openai_stream(&["reply"])).await;
    let dir = TempDir::new().unwrap();
    let store = SessionStore::open(dir.path().join("sessions.json"));

    let config = GenerationConfig::default();
    let first = run_chat_turn(&relay, &store, None, "gpt-4o", "One", &config, |_| {})
        .await
        .unwrap();
    let second = run_chat_turn(
        &relay,
        &store,
        Some(&first.session_id),
        "gpt-4o",
        "Two",
        &config,
        |_| {},
    )
    .await
    .unwrap();

    assert_eq!(first.session_id, second.session_id);
    let session = store.load(&first.session_id).unwrap().unwrap();
    assert_eq!(session.messages.len(), 4);
    assert_eq!(session.messages[2].content, "Two");
    // Title still comes from the first turn
    assert_eq!(session.title, "One");
}

#[tokio::test]
async fn unknown_model_is_rejected_before_any_call() {
    let relay = RelayClient::new("http://127.0.0.1:9");
    let dir = TempDir::new().unwrap();
    let store = SessionStore::open(dir.path().join("sessions.json"));

    let result = run_chat_turn(
        &relay,
        &store,
        None,
        "not-a-model",
        "Hi",
        &GenerationConfig::default(),
        |_| {},
    )
    .await;
    assert!(result.is_err());
    assert!(!dir.path().join("sessions.json").exists());
}
