//! Axum-based HTTP gateway exposing the core operations.
//!
//! Thin transport over the query, dispatch, and status surfaces, with
//! request body limits (64KB max) and request timeouts (30s). No CORS or
//! auth layers here; front with a reverse proxy when policy is needed.

use crate::connection::ConnectionMonitor;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::query::QueryService;
use crate::store::MessageStore;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) — prevents slow-loris attacks
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub query: Arc<QueryService>,
    pub dispatcher: Arc<Dispatcher>,
    pub monitor: Arc<ConnectionMonitor>,
    pub store: Arc<MessageStore>,
}

// ── Request shapes ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct MessagesQuery {
    /// Cursor: return only records strictly after this id.
    pub after: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub peer: Option<String>,
}

#[derive(Deserialize)]
pub struct SendBody {
    pub to: String,
    pub body: String,
}

// ── Server ───────────────────────────────────────────────────────

/// Run the HTTP gateway until the listener is shut down.
pub async fn run_gateway(host: &str, port: u16, state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_port = listener.local_addr()?.port();
    let display_addr = format!("{host}:{actual_port}");

    println!("🦀 waygate listening on http://{display_addr}");
    println!("  GET  /health           — liveness check");
    println!("  GET  /status           — connection state + buffer summary");
    println!("  GET  /messages         — all buffered records");
    println!("  GET  /messages?after=  — records after a cursor id");
    println!("  GET  /messages/search  — ?peer=<substring>");
    println!("  POST /send             — {{\"to\": \"...\", \"body\": \"...\"}}");
    println!("  Press Ctrl+C to stop.\n");

    crate::health::mark_component_ok("gateway");

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

/// Build the route table. Factored out of [`run_gateway`] so tests can drive
/// handlers without a socket.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/messages", get(handle_messages))
        .route("/messages/search", get(handle_search))
        .route("/send", post(handle_send))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

// ── Handlers ─────────────────────────────────────────────────────

/// GET /health — always public (no secrets leaked)
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "runtime": crate::health::snapshot_json(),
    }))
}

/// GET /status — connection state and buffer summary
async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let health = crate::health::snapshot();
    Json(serde_json::json!({
        "connection": state.monitor.current_state(),
        "buffered": state.store.len(),
        "capacity": state.store.capacity(),
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "uptime_seconds": health.uptime_seconds,
    }))
}

/// GET /messages — full listing, or incremental with `?after=<id>`
async fn handle_messages(
    State(state): State<AppState>,
    Query(params): Query<MessagesQuery>,
) -> impl IntoResponse {
    let records = match params.after.as_deref() {
        Some(cursor) => state.query.list_since(cursor),
        None => state.query.list_all(),
    };

    Json(serde_json::json!({
        "count": records.len(),
        "messages": records,
    }))
}

/// GET /messages/search?peer=<substring>
async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> impl IntoResponse {
    let term = params.peer.unwrap_or_default();

    match state.query.search_by_peer(&term) {
        Ok(records) => Json(serde_json::json!({
            "count": records.len(),
            "messages": records,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// POST /send — submit one outbound message
async fn handle_send(
    State(state): State<AppState>,
    Json(body): Json<SendBody>,
) -> impl IntoResponse {
    match state.dispatcher.send(&body.to, &body.body).await {
        Ok(()) => Json(serde_json::json!({"status": "submitted"})).into_response(),
        Err(e) => {
            let status = match e {
                DispatchError::EmptyPeerId | DispatchError::EmptyText => StatusCode::BAD_REQUEST,
                DispatchError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
                DispatchError::Transport(_) => StatusCode::BAD_GATEWAY,
            };
            (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
        }
    }
}
