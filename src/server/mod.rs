//! Relay HTTP server
//!
//! One streaming proxy endpoint per provider family plus a health probe:
//! - POST /api/openai
//! - POST /api/claude
//! - POST /api/grok
//! - GET  /api/status

mod relay;
pub mod types;

use anyhow::Result;
use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::CONFIG;
use crate::state::AppState;
use types::StatusResponse;

/// Create the router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let allow_origin = if CONFIG.cors_origin == "*" {
        AllowOrigin::any()
    } else {
        match CONFIG.cors_origin.parse::<HeaderValue>() {
            Ok(origin) => AllowOrigin::exact(origin),
            Err(_) => AllowOrigin::any(),
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(crate::secrets::CLIENT_KEYS_HEADER),
        ]);

    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/openai", post(relay::openai_relay_handler))
        .route("/api/claude", post(relay::claude_relay_handler))
        .route("/api/grok", post(relay::grok_relay_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the relay server until shutdown
pub async fn run(host: &str, port: u16) -> Result<()> {
    let state = AppState::new();
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("relay listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
