use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::camera::CameraApi;
use crate::config::{CacheConfig, LiveConfig};
use crate::server::live::{LiveChannelHub, LiveSettings, LiveStream};
use crate::telemetry::{
    PtzCapabilities, SingleFlightCache, StatusAggregator, StatusSnapshot, ViewerPresenceTracker,
};

#[derive(Clone)]
pub struct AppState {
    pub status_cache: Arc<SingleFlightCache<StatusSnapshot>>,
    pub capabilities_cache: Arc<SingleFlightCache<PtzCapabilities>>,
    pub presence: ViewerPresenceTracker,
    pub hub: LiveChannelHub,
    pub keep_alive: Duration,
}

impl AppState {
    /// Wires both caches, the viewer registry and the live hub around one camera.
    pub fn new(camera: Arc<dyn CameraApi>, cache: &CacheConfig, live: &LiveConfig) -> Self {
        let aggregator = StatusAggregator::new(camera);

        let status_cache = {
            let aggregator = aggregator.clone();
            Arc::new(SingleFlightCache::new("status", cache.status_ttl(), move || {
                let aggregator = aggregator.clone();
                async move { Ok(aggregator.build().await) }
            }))
        };

        let capabilities_cache = Arc::new(SingleFlightCache::new(
            "ptz capabilities",
            cache.capabilities_ttl(),
            move || {
                let aggregator = aggregator.clone();
                async move { Ok(aggregator.capabilities().await) }
            },
        ));

        let presence = ViewerPresenceTracker::new(live.viewer_ttl());
        let hub = LiveChannelHub::new(
            Arc::clone(&status_cache),
            presence.clone(),
            LiveSettings {
                status_interval: live.status_interval(),
                presence_interval: live.presence_interval(),
            },
        );

        Self {
            status_cache,
            capabilities_cache,
            presence,
            hub,
            keep_alive: live.keep_alive(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Push channel
        .route("/api/live", get(live_channel))
        // Pull endpoints, served through the caches
        .route("/api/status", get(status))
        .route("/api/ptz/capabilities", get(ptz_capabilities))
        // Presence
        .route("/api/viewers", get(viewer_count))
        .route("/api/viewers/heartbeat", post(heartbeat))
        // Health check
        .route("/health", get(health_check))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    pub viewer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewerCount {
    pub count: usize,
}

async fn live_channel(
    State(state): State<AppState>,
    Query(query): Query<LiveQuery>,
) -> Sse<LiveStream> {
    let viewer = query
        .viewer
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    Sse::new(state.hub.open(viewer)).keep_alive(
        KeepAlive::new()
            .interval(state.keep_alive)
            .text("ping"),
    )
}

async fn status(State(state): State<AppState>) -> Response {
    match state.status_cache.get().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            tracing::error!("Status request failed: {}", e);
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

async fn ptz_capabilities(State(state): State<AppState>) -> Response {
    match state.capabilities_cache.get().await {
        Ok(capabilities) => (StatusCode::OK, Json(capabilities)).into_response(),
        Err(e) => {
            tracing::error!("PTZ capabilities request failed: {}", e);
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

async fn viewer_count(State(state): State<AppState>) -> Json<ViewerCount> {
    Json(ViewerCount {
        count: state.presence.count().await,
    })
}

async fn heartbeat(
    State(state): State<AppState>,
    Json(request): Json<HeartbeatRequest>,
) -> Response {
    let id = request.id.trim();
    if id.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "viewer id must not be empty" })))
            .into_response();
    }

    let count = state.presence.heartbeat(id).await;
    tracing::debug!("Heartbeat from viewer {} ({} live)", id, count);
    (StatusCode::OK, Json(ViewerCount { count })).into_response()
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    tracing::trace!("Health check ({} live connections)", state.hub.open_connections());
    (StatusCode::OK, "OK")
}
