use axum::{Json, extract::State, response::IntoResponse};

use crate::metrics;
use crate::server::AppState;

/// `GET /`: liveness ping.
pub async fn ping_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "ping": "pong" }))
}

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot(state.hub.waiting());

    // Per-connection faults stay in /metrics; they never mark the server unhealthy.
    let status = if state.shutdown.is_cancelled() {
        "shutting_down"
    } else {
        "healthy"
    };

    Json(metrics::HealthStatus {
        status: status.to_string(),
        version: state.hub.version(),
        streams: snapshot.streams.active,
        sessions: snapshot.sessions.active,
        uptime_secs: snapshot.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot(state.hub.waiting()))
}

/// Liveness check - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}
