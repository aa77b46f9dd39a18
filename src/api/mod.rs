use crate::dispatch::{Message, MessageBus, MessageResponse};
use crate::engine::InMemoryRuleEngine;
use crate::scripts;
use crate::storage::{LocalState, SyncSettings};
use crate::unblock::OverrideSlot;
use axum::{
    extract::{Json as AxumJson, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

struct ApiState {
    bus: MessageBus,
    sync: SyncSettings,
    local: LocalState,
    engine: Arc<InMemoryRuleEngine>,
    overrides: OverrideSlot,
}

pub async fn start_api_server(
    bus: MessageBus,
    sync: SyncSettings,
    local: LocalState,
    engine: Arc<InMemoryRuleEngine>,
    overrides: OverrideSlot,
    port: u16,
) {
    let state = Arc::new(ApiState {
        bus,
        sync,
        local,
        engine,
        overrides,
    });

    let app = Router::new()
        .route("/api/message", post(post_message))
        .route("/api/status", get(get_status))
        .route("/api/blacklist", get(get_blacklist))
        .route("/api/stats", get(get_stats))
        .route("/api/check", get(get_check))
        .route("/api/scan", post(post_scan))
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// The event bus endpoint: extension pages post their messages here.
async fn post_message(
    State(state): State<Arc<ApiState>>,
    AxumJson(message): AxumJson<Message>,
) -> Json<MessageResponse> {
    Json(state.bus.send(message).await)
}

async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let enabled = state.sync.block_enabled().await.unwrap_or(true);
    Json(serde_json::json!({
        "blocking_enabled": enabled,
        "override_remaining_secs": state.overrides.remaining_secs(),
    }))
}

async fn get_blacklist(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.sync.blacklist().await.unwrap_or_default())
}

async fn get_stats(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.local.block_stats().await.unwrap_or_default())
}

#[derive(serde::Deserialize)]
struct CheckQuery {
    url: String,
    #[serde(default)]
    initiator: Option<String>,
}

#[derive(serde::Deserialize)]
struct ScanRequest {
    url: String,
    html: String,
}

/// The content-script flow: strips fingerprinting scripts from a page and
/// reports each removal on the event bus.
async fn post_scan(
    State(state): State<Arc<ApiState>>,
    AxumJson(request): AxumJson<ScanRequest>,
) -> impl IntoResponse {
    let (stripped, removed) = scripts::strip_fingerprinting_scripts(&request.html);
    for _ in &removed {
        state
            .bus
            .send(Message::BlockedScript {
                url: request.url.clone(),
            })
            .await;
    }
    Json(serde_json::json!({ "html": stripped, "removed": removed }))
}

/// Runs a navigation through the active rules, the way the host engine
/// would intercept it. A match redirects and feeds the statistics counter.
async fn get_check(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<CheckQuery>,
) -> impl IntoResponse {
    let redirect = state.engine.evaluate(&query.url, query.initiator.as_deref());
    Json(serde_json::json!({
        "blocked": redirect.is_some(),
        "redirect": redirect,
    }))
}
