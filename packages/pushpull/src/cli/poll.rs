use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::ClientError;
use crate::config::ClientConfig;
use crate::protocol::{PollQuery, PollResponse};

/// One `/poll` request at a time.
#[derive(Clone)]
pub struct PollClient {
    http: reqwest::Client,
    url: String,
}

impl PollClient {
    pub fn new(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            url: config.url("/poll"),
        }
    }

    /// `None` asks for the current state without waiting.
    pub async fn fetch(&self, last_seen: Option<u64>) -> Result<PollResponse, ClientError> {
        let resp = self
            .http
            .get(&self.url)
            .query(&PollQuery { last_seen })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(ClientError::from_reqwest)?;
        resp.json().await.map_err(ClientError::from_reqwest)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    Update { message: String, version: u64 },
    NoUpdate { last_seen: u64 },
}

/// Repeating long-poll that remembers the last version it saw.
///
/// The first request carries no `last_seen`, so it picks up the state the
/// server already holds before waiting for changes.
pub struct PollLoop {
    client: PollClient,
    last_seen: Option<u64>,
    interval: Duration,
}

impl PollLoop {
    pub fn new(client: PollClient, interval: Duration) -> Self {
        Self {
            client,
            last_seen: None,
            interval,
        }
    }

    pub fn last_seen(&self) -> Option<u64> {
        self.last_seen
    }

    /// Issue one poll and advance `last_seen` if it brought an update.
    pub async fn step(&mut self) -> Result<PollEvent, ClientError> {
        let resp = self.client.fetch(self.last_seen).await?;
        match resp.message {
            Some(message) => {
                self.last_seen = Some(resp.timestamp);
                Ok(PollEvent::Update {
                    message,
                    version: resp.timestamp,
                })
            }
            None => Ok(PollEvent::NoUpdate {
                last_seen: resp.timestamp,
            }),
        }
    }

    /// Poll until `stop` is cancelled, pausing `interval` after every request.
    ///
    /// Transient failures are logged and retried; any other failure ends the loop.
    pub async fn run<F>(
        &mut self,
        stop: &CancellationToken,
        mut on_event: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(&PollEvent),
    {
        loop {
            let result = tokio::select! {
                _ = stop.cancelled() => break,
                result = self.step() => result,
            };

            match result {
                Ok(event) => on_event(&event),
                Err(e) if e.is_transient() => {
                    warn!(last_seen = ?self.last_seen, "Poll failed, retrying: {}", e)
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!(last_seen = ?self.last_seen, "Poll loop stopped");
        Ok(())
    }
}
