use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use tracing::debug;

use super::error::ClientError;
use crate::config::ClientConfig;

/// Result of one request/reply round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    Reply(String),
    /// Either side sent the terminator
    Terminated,
    /// Server went away without replying
    Closed,
}

/// Client end of a `/ws` duplex session.
pub struct DuplexClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    terminator: String,
}

impl DuplexClient {
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let url = config.ws_url();
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(ClientError::from_tungstenite)?;
        debug!(url = %url, "Duplex session connected");
        Ok(Self {
            ws,
            terminator: config.terminator.clone(),
        })
    }

    /// Send one frame and wait for the reply to it.
    ///
    /// Sending the terminator ends the round without waiting.
    pub async fn exchange(&mut self, text: &str) -> Result<Exchange, ClientError> {
        self.ws
            .send(tungstenite::Message::Text(text.into()))
            .await
            .map_err(ClientError::from_tungstenite)?;
        if text == self.terminator {
            return Ok(Exchange::Terminated);
        }

        loop {
            match self.ws.next().await {
                Some(Ok(tungstenite::Message::Text(reply))) => {
                    let reply = reply.as_str();
                    if reply == self.terminator {
                        return Ok(Exchange::Terminated);
                    }
                    return Ok(Exchange::Reply(reply.to_string()));
                }
                Some(Ok(tungstenite::Message::Close(_))) | None => return Ok(Exchange::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ClientError::from_tungstenite(e)),
            }
        }
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        match self.ws.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(ClientError::from_tungstenite(e)),
        }
    }
}
