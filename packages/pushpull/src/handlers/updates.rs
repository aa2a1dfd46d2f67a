use axum::{
    Json,
    extract::{Query, State},
};
use tracing::debug;
use update_hub::WaitOutcome;

use crate::protocol::{PollQuery, PollResponse, UpdateRequest, UpdateResponse};
use crate::server::AppState;

/// `POST /update`: replace the shared state.
pub async fn publish_handler(
    State(state): State<AppState>,
    Json(req): Json<UpdateRequest>,
) -> Json<UpdateResponse> {
    let version = state.hub.publish(req.message);
    state.metrics.published();
    Json(UpdateResponse::updated(version))
}

/// `GET /poll?last_seen=<version>`: park until something newer exists.
///
/// Without `last_seen` the current state is returned immediately.
///
/// A client that disconnects mid-wait drops this future, which releases its
/// waiter registration with it.
pub async fn poll_handler(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Json<PollResponse> {
    state.metrics.poll_started();

    let outcome = match query.last_seen {
        None => WaitOutcome::Updated(state.hub.current()),
        Some(last_seen) => tokio::select! {
            outcome = state.hub.wait_for_update(last_seen, state.config.long_poll_timeout) => outcome,
            _ = state.shutdown.cancelled() => WaitOutcome::TimedOut { last_seen },
        },
    };

    match outcome {
        WaitOutcome::Updated(update) => {
            state.metrics.poll_updated();
            debug!(last_seen = ?query.last_seen, version = update.version, "Poll answered with update");
            Json(PollResponse::from(update))
        }
        WaitOutcome::TimedOut { last_seen } => {
            state.metrics.poll_timed_out();
            debug!(last_seen, "Poll timed out");
            Json(PollResponse::no_update(last_seen))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::{get, post},
    };
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(timeout: Duration) -> AppState {
        let config = ServerConfig {
            long_poll_timeout: timeout,
            ..ServerConfig::default()
        };
        AppState::new(config, std::sync::Arc::new(crate::ws::Echo))
    }

    fn test_router(state: AppState) -> Router {
        Router::new()
            .route("/update", post(publish_handler))
            .route("/poll", get(poll_handler))
            .with_state(state)
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn publish_request(message: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/update")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "message": message }).to_string(),
            ))
            .unwrap()
    }

    fn poll_request(last_seen: u64) -> Request<Body> {
        Request::builder()
            .uri(format!("/poll?last_seen={}", last_seen))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_publish_returns_updated() {
        let state = test_state(Duration::from_secs(15));
        let app = test_router(state.clone());

        let resp = app.oneshot(publish_request("hello")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "updated");
        assert_eq!(json["version"], 1);
        assert_eq!(state.hub.current().payload, "hello");
    }

    #[tokio::test]
    async fn test_publish_rejects_malformed_body() {
        let state = test_state(Duration::from_secs(15));
        let app = test_router(state.clone());

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/update")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"msg":42}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
        assert_eq!(state.hub.version(), 0);
    }

    #[tokio::test]
    async fn test_poll_after_publishes_returns_latest() {
        let state = test_state(Duration::from_secs(15));
        let app = test_router(state.clone());

        for msg in ["A", "B", "C"] {
            let resp = app.clone().oneshot(publish_request(msg)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let resp = app.oneshot(poll_request(0)).await.unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["message"], "C");
        assert_eq!(json["timestamp"], 3);
    }

    #[tokio::test]
    async fn test_first_poll_returns_initial_state() {
        let state = test_state(Duration::from_secs(15));
        let app = test_router(state);

        let resp = app
            .oneshot(Request::builder().uri("/poll").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["message"], "Initial message");
        assert_eq!(json["timestamp"], 0);
    }

    #[tokio::test]
    async fn test_poll_without_last_seen_returns_latest() {
        let state = test_state(Duration::from_secs(15));
        state.hub.publish("first");
        let app = test_router(state.clone());

        let resp = app
            .oneshot(Request::builder().uri("/poll").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["message"], "first");
        assert_eq!(json["timestamp"], 1);
        assert_eq!(state.hub.waiting(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout_echoes_last_seen() {
        let state = test_state(Duration::from_secs(15));
        state.hub.publish("only");
        let app = test_router(state.clone());

        let start = tokio::time::Instant::now();
        let resp = app.oneshot(poll_request(1)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(15));

        let json = body_json(resp).await;
        assert!(json["message"].is_null());
        assert_eq!(json["timestamp"], 1);
        assert_eq!(state.hub.waiting(), 0);
        assert_eq!(state.metrics.snapshot(0).polls.timed_out, 1);
    }

    #[tokio::test]
    async fn test_parked_poll_wakes_on_publish() {
        let state = test_state(Duration::from_secs(10));
        let app = test_router(state.clone());

        let poller = tokio::spawn(app.clone().oneshot(poll_request(0)));
        while state.hub.waiting() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!poller.is_finished());

        state.hub.publish("A");
        state.hub.publish("B");

        let resp = poller.await.unwrap().unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["message"], "B");
        assert_eq!(json["timestamp"], 2);
    }

    #[tokio::test]
    async fn test_shutdown_releases_parked_poll() {
        let state = test_state(Duration::from_secs(60));
        let app = test_router(state.clone());

        let poller = tokio::spawn(app.oneshot(poll_request(0)));
        while state.hub.waiting() == 0 {
            tokio::task::yield_now().await;
        }
        state.shutdown.cancel();

        let json = body_json(poller.await.unwrap().unwrap()).await;
        assert!(json["message"].is_null());
        assert_eq!(json["timestamp"], 0);
    }
}
