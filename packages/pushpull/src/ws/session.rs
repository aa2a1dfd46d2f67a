use futures::{Sink, SinkExt, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use super::policy::ReplyPolicy;
use crate::metrics::ServerMetrics;

/// Lifecycle of one duplex connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// Transport-neutral view of an inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary,
    /// Ping/pong and other control traffic the transport answers itself
    Control,
    Close,
}

/// Why a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed the connection or the stream ended
    PeerClosed,
    /// Peer sent the terminator frame
    PeerTerminated,
    /// Our reply was the terminator frame
    LocalTerminated,
    /// The reply policy gave up (e.g. operator input closed)
    ReplyUnavailable,
    /// Transport failure while reading or writing
    ProtocolError(String),
    /// Server is shutting down
    Shutdown,
}

impl CloseReason {
    pub fn is_error(&self) -> bool {
        matches!(self, CloseReason::ProtocolError(_))
    }

    /// Whether the peer is still around to receive a close frame.
    fn peer_reachable(&self) -> bool {
        !matches!(self, CloseReason::PeerClosed | CloseReason::ProtocolError(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} is already closed")]
    Closed(Uuid),
}

/// State owned by the task serving one duplex connection.
pub struct DuplexSession {
    id: Uuid,
    state: SessionState,
    terminator: String,
    frames_received: u64,
    frames_sent: u64,
    metrics: Option<Arc<ServerMetrics>>,
}

enum Step {
    Text(String),
    Skip,
    Close(CloseReason),
}

impl DuplexSession {
    pub fn new(terminator: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Connecting,
            terminator: terminator.into(),
            frames_received: 0,
            frames_sent: 0,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Drive the session until it closes.
    ///
    /// Frames that arrive while a reply is pending are queued and answered in
    /// order. A disconnect or shutdown during that wait closes the session
    /// without waiting for the reply.
    pub async fn run<R, W, E>(
        &mut self,
        inbound: R,
        outbound: W,
        policy: &dyn ReplyPolicy,
        shutdown: &CancellationToken,
    ) -> Result<CloseReason, SessionError>
    where
        R: Stream<Item = Result<Inbound, E>>,
        E: Display,
        W: Sink<String>,
        W::Error: Display,
    {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed(self.id));
        }

        let mut inbound = pin!(inbound);
        let mut outbound = pin!(outbound);
        let mut pending: VecDeque<String> = VecDeque::new();

        self.state = SessionState::Open;
        debug!(session_id = %self.id, "Session open");

        let reason = loop {
            let text = match pending.pop_front() {
                Some(text) => text,
                None => {
                    let next = tokio::select! {
                        _ = shutdown.cancelled() => break CloseReason::Shutdown,
                        next = inbound.next() => next,
                    };
                    match classify(next) {
                        Step::Text(text) => text,
                        Step::Skip => continue,
                        Step::Close(reason) => break reason,
                    }
                }
            };

            self.frames_received += 1;
            if let Some(m) = &self.metrics {
                m.frame_received();
            }
            trace!(session_id = %self.id, len = text.len(), "Frame received");

            if text == self.terminator {
                break CloseReason::PeerTerminated;
            }

            let reply = {
                let mut pending_reply = policy.reply(&text);
                loop {
                    tokio::select! {
                        reply = &mut pending_reply => break Ok(reply),
                        _ = shutdown.cancelled() => break Err(CloseReason::Shutdown),
                        next = inbound.next() => match classify(next) {
                            Step::Text(queued) => pending.push_back(queued),
                            Step::Skip => {}
                            Step::Close(reason) => break Err(reason),
                        },
                    }
                }
            };

            let reply = match reply {
                Ok(Some(reply)) => reply,
                Ok(None) => break CloseReason::ReplyUnavailable,
                Err(reason) => break reason,
            };

            let terminating = reply == self.terminator;
            if let Err(e) = outbound.send(reply).await {
                break CloseReason::ProtocolError(e.to_string());
            }
            self.frames_sent += 1;
            if let Some(m) = &self.metrics {
                m.frame_sent();
            }

            if terminating {
                break CloseReason::LocalTerminated;
            }
        };

        if reason.peer_reachable() {
            if let Err(e) = outbound.close().await {
                debug!(session_id = %self.id, "Close frame not delivered: {}", e);
            }
        }

        self.state = SessionState::Closed;
        debug!(
            session_id = %self.id,
            reason = ?reason,
            received = self.frames_received,
            sent = self.frames_sent,
            "Session closed"
        );
        Ok(reason)
    }
}

fn classify<E: Display>(next: Option<Result<Inbound, E>>) -> Step {
    match next {
        None | Some(Ok(Inbound::Close)) => Step::Close(CloseReason::PeerClosed),
        Some(Err(e)) => Step::Close(CloseReason::ProtocolError(e.to_string())),
        Some(Ok(Inbound::Text(text))) => Step::Text(text),
        Some(Ok(Inbound::Binary)) => {
            debug!("Binary frames not supported");
            Step::Skip
        }
        Some(Ok(Inbound::Control)) => Step::Skip,
    }
}
