//! Server metrics for observability
//!
//! Counters for each transport, exposed as a JSON snapshot on `/metrics`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Publish metrics
    /// Updates accepted on `/update`
    pub publishes: AtomicU64,

    // Long-poll metrics
    /// Poll requests received
    pub polls: AtomicU64,
    /// Polls answered with a newer update
    pub polls_updated: AtomicU64,
    /// Polls answered with the "no update" sentinel
    pub polls_timed_out: AtomicU64,

    // Event stream metrics
    /// Currently open event streams
    pub active_streams: AtomicU64,
    /// Event streams opened since server start
    pub total_streams: AtomicU64,
    /// Events emitted across all streams
    pub events_emitted: AtomicU64,

    // Duplex metrics
    /// Currently open duplex sessions
    pub active_sessions: AtomicU64,
    /// Duplex sessions opened since server start
    pub total_sessions: AtomicU64,
    /// Text frames received from duplex peers
    pub frames_received: AtomicU64,
    /// Text frames sent to duplex peers
    pub frames_sent: AtomicU64,
    /// Sessions that ended on a transport or protocol error
    pub session_errors: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn published(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    // Long-poll tracking
    pub fn poll_started(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn poll_updated(&self) {
        self.polls_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn poll_timed_out(&self) {
        self.polls_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    // Stream tracking
    pub fn stream_opened(&self) {
        self.active_streams.fetch_add(1, Ordering::Relaxed);
        self.total_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_closed(&self) {
        self.active_streams.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn event_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    // Session tracking
    pub fn session_opened(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_error(&self) {
        self.session_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics. `waiting` is the hub's live waiter count.
    pub fn snapshot(&self, waiting: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            publishes: self.publishes.load(Ordering::Relaxed),
            polls: PollMetrics {
                total: self.polls.load(Ordering::Relaxed),
                updated: self.polls_updated.load(Ordering::Relaxed),
                timed_out: self.polls_timed_out.load(Ordering::Relaxed),
                waiting: waiting as u64,
            },
            streams: StreamMetrics {
                active: self.active_streams.load(Ordering::Relaxed),
                total: self.total_streams.load(Ordering::Relaxed),
                events_emitted: self.events_emitted.load(Ordering::Relaxed),
            },
            sessions: SessionMetrics {
                active: self.active_sessions.load(Ordering::Relaxed),
                total: self.total_sessions.load(Ordering::Relaxed),
                frames_received: self.frames_received.load(Ordering::Relaxed),
                frames_sent: self.frames_sent.load(Ordering::Relaxed),
                errors: self.session_errors.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub publishes: u64,
    pub polls: PollMetrics,
    pub streams: StreamMetrics,
    pub sessions: SessionMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollMetrics {
    pub total: u64,
    pub updated: u64,
    pub timed_out: u64,
    pub waiting: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMetrics {
    pub active: u64,
    pub total: u64,
    pub events_emitted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub active: u64,
    pub total: u64,
    pub frames_received: u64,
    pub frames_sent: u64,
    pub errors: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: u64,
    pub streams: u64,
    pub sessions: u64,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_tracking() {
        let metrics = ServerMetrics::new();

        metrics.stream_opened();
        metrics.stream_opened();
        assert_eq!(metrics.active_streams.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.total_streams.load(Ordering::Relaxed), 2);

        metrics.stream_closed();
        assert_eq!(metrics.active_streams.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_streams.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_session_tracking() {
        let metrics = ServerMetrics::new();

        metrics.session_opened();
        metrics.frame_received();
        metrics.frame_sent();
        metrics.session_closed();

        let snapshot = metrics.snapshot(0);
        assert_eq!(snapshot.sessions.active, 0);
        assert_eq!(snapshot.sessions.total, 1);
        assert_eq!(snapshot.sessions.frames_received, 1);
        assert_eq!(snapshot.sessions.frames_sent, 1);
    }

    #[test]
    fn test_snapshot() {
        let metrics = ServerMetrics::new();
        metrics.published();
        metrics.poll_started();
        metrics.poll_timed_out();

        let snapshot = metrics.snapshot(3);
        assert_eq!(snapshot.publishes, 1);
        assert_eq!(snapshot.polls.total, 1);
        assert_eq!(snapshot.polls.timed_out, 1);
        assert_eq!(snapshot.polls.updated, 0);
        assert_eq!(snapshot.polls.waiting, 3);
    }
}
