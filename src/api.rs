//! Read-only HTTP query surface and router assembly.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::state::AppState;
use crate::types::{ChannelInfo, HealthSnapshot};
use crate::ws;

/// Build the full application router: WebSocket, HTTP queries, static fallback
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.config().static_dir.clone();

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/streams", get(list_streams))
        .route("/api/streams/{stream_id}", get(get_stream))
        .route("/api/streams/{stream_id}/stats", get(get_stream_stats))
        .route("/health", get(health))
        .fallback_service(ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// GET /api/streams
pub async fn list_streams(State(state): State<Arc<AppState>>) -> Json<Vec<ChannelInfo>> {
    Json(state.live_channels().await)
}

/// GET /api/streams/{stream_id}
pub async fn get_stream(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<String>,
) -> Response {
    match state.channel_info(&stream_id).await {
        Some(info) => Json(info).into_response(),
        None => not_found(),
    }
}

/// GET /api/streams/{stream_id}/stats
pub async fn get_stream_stats(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<String>,
) -> Response {
    match state.channel_stats(&stream_id).await {
        Some(stats) => Json(json!({
            "streamId": stream_id,
            "viewerCount": stats.viewer_count,
            "startTime": stats.start_time.timestamp_millis(),
            "duration": stats.duration,
            "isLive": stats.is_live,
        }))
        .into_response(),
        None => not_found(),
    }
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthSnapshot> {
    Json(state.health().await)
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Stream not found" })),
    )
        .into_response()
}
