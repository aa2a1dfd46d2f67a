use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::info;
use update_hub::NotificationHub;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::handlers;
use crate::metrics::ServerMetrics;
use crate::ws::ReplyPolicy;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<NotificationHub>,
    pub config: Arc<ServerConfig>,
    pub metrics: Arc<ServerMetrics>,
    pub reply_policy: Arc<dyn ReplyPolicy>,
    /// Cancelled once on shutdown; parked polls, streams and sessions all watch it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ServerConfig, reply_policy: Arc<dyn ReplyPolicy>) -> Self {
        let hub = Arc::new(NotificationHub::new(config.initial_message.clone()));
        Self {
            hub,
            config: Arc::new(config),
            metrics: Arc::new(ServerMetrics::new()),
            reply_policy,
            shutdown: CancellationToken::new(),
        }
    }

    /// Share an existing shutdown token (e.g. one cancelled on Ctrl+C).
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::ping_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/update", post(handlers::publish_handler))
        .route("/poll", get(handlers::poll_handler))
        .route("/stream", get(handlers::stream_handler))
        .route("/ws", get(handlers::duplex_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `state.shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    let shutdown = state.shutdown.clone();
    let app = router(state);

    info!("Pushpull listening on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /update              - Replace the shared state");
    info!("  GET    /poll?last_seen=<v>  - Long-poll for a newer version");
    info!("  GET    /stream              - Server-sent event stream");
    info!("  GET    /ws                  - Duplex websocket session");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Received shutdown signal, draining connections...");
        })
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}
