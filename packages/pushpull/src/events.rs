//! Heartbeat event stream
//!
//! Each `/stream` connection owns one [`StreamSession`]: a timer and a tick
//! counter. The session lives inside the response body stream, so when the
//! client goes away and the body is dropped, the timer goes with it.

use chrono::{DateTime, Local};
use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::metrics::ServerMetrics;

pub struct StreamSession {
    id: Uuid,
    ticks: u64,
    interval: Interval,
    metrics: Option<Arc<ServerMetrics>>,
}

impl StreamSession {
    /// Start a session whose first event fires one `period` from now.
    pub fn new(period: Duration, metrics: Option<Arc<ServerMetrics>>) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if let Some(m) = &metrics {
            m.stream_opened();
        }

        let id = Uuid::new_v4();
        debug!(stream_id = %id, period_ms = period.as_millis() as u64, "Event stream opened");

        Self {
            id,
            ticks: 0,
            interval,
            metrics,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub async fn next_event(&mut self) -> String {
        self.interval.tick().await;
        self.ticks += 1;
        if let Some(m) = &self.metrics {
            m.event_emitted();
        }
        server_time_line(Local::now())
    }

    /// Endless stream of events. It never ends by itself; dropping it ends the session.
    pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
        futures::stream::unfold(self, |mut session| async move {
            let event = session.next_event().await;
            Some((event, session))
        })
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if let Some(m) = &self.metrics {
            m.stream_closed();
        }
        debug!(stream_id = %self.id, ticks = self.ticks, "Event stream closed");
    }
}

/// `Server time: Tue Oct 14 09:30:00 2026`
pub fn server_time_line(now: DateTime<Local>) -> String {
    format!("Server time: {}", now.format("%a %b %e %H:%M:%S %Y"))
}
