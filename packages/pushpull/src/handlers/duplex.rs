use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt, future};
use std::error::Error as _;
use tokio_tungstenite::tungstenite;
use tracing::{debug, info, warn};

use crate::server::AppState;
use crate::ws::{DuplexSession, Inbound};

impl From<Message> for Inbound {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(text) => Inbound::Text(text.as_str().to_owned()),
            Message::Binary(_) => Inbound::Binary,
            Message::Ping(_) | Message::Pong(_) => Inbound::Control,
            Message::Close(_) => Inbound::Close,
        }
    }
}

/// Whether a read error only means the peer went away.
///
/// Dropping the socket without a close frame surfaces as a reset or an EOF,
/// which ends the session like a regular close.
fn is_disconnect(err: &axum::Error) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return is_reset(io);
        }
        if let Some(ws) = e.downcast_ref::<tungstenite::Error>() {
            return match ws {
                tungstenite::Error::ConnectionClosed
                | tungstenite::Error::AlreadyClosed
                | tungstenite::Error::Protocol(
                    tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
                ) => true,
                tungstenite::Error::Io(io) => is_reset(io),
                _ => false,
            };
        }
        source = e.source();
    }
    false
}

fn is_reset(io: &std::io::Error) -> bool {
    matches!(
        io.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
    )
}

fn to_inbound(msg: Result<Message, axum::Error>) -> Result<Inbound, axum::Error> {
    match msg {
        Ok(msg) => Ok(Inbound::from(msg)),
        Err(e) if is_disconnect(&e) => {
            debug!("Peer dropped the connection: {}", e);
            Ok(Inbound::Close)
        }
        Err(e) => Err(e),
    }
}

/// `GET /ws`: upgrade to a duplex session.
pub async fn duplex_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_duplex(socket, state))
}

async fn handle_duplex(socket: WebSocket, state: AppState) {
    let mut session =
        DuplexSession::new(state.config.terminator.clone()).with_metrics(state.metrics.clone());
    let session_id = session.id();

    info!(session_id = %session_id, "Duplex connection accepted");
    state.metrics.session_opened();

    let (sender, receiver) = socket.split();
    let inbound = receiver.map(to_inbound);
    let outbound = sender.with(|text: String| {
        future::ready(Ok::<_, axum::Error>(Message::Text(text.into())))
    });

    match session
        .run(inbound, outbound, state.reply_policy.as_ref(), &state.shutdown)
        .await
    {
        Ok(reason) if reason.is_error() => {
            state.metrics.session_error();
            warn!(session_id = %session_id, reason = ?reason, "Duplex session failed");
        }
        Ok(reason) => {
            info!(session_id = %session_id, reason = ?reason, "Duplex session closed");
        }
        Err(e) => {
            warn!(session_id = %session_id, "Duplex session not started: {}", e);
        }
    }

    state.metrics.session_closed();
}
