use futures::{Stream, StreamExt};
use std::collections::VecDeque;

use super::error::ClientError;
use super::sse::SseDecoder;
use crate::config::ClientConfig;

/// Subscribes to `/stream`.
#[derive(Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    url: String,
}

impl StreamClient {
    pub fn new(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            url: config.url("/stream"),
        }
    }

    /// Open the stream and yield event payloads until the server ends it.
    ///
    /// A transport error or an oversized line is yielded once and ends the stream.
    pub async fn subscribe(
        &self,
    ) -> Result<impl Stream<Item = Result<String, ClientError>> + Send + use<>, ClientError> {
        let resp = self
            .http
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(ClientError::from_reqwest)?;

        let state = Decoding {
            body: Some(Box::pin(resp.bytes_stream())),
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
        };
        Ok(futures::stream::unfold(state, Decoding::next))
    }
}

struct Decoding<S> {
    body: Option<std::pin::Pin<Box<S>>>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
}

impl<S, B> Decoding<S>
where
    S: Stream<Item = reqwest::Result<B>>,
    B: AsRef<[u8]>,
{
    async fn next(mut self) -> Option<(Result<String, ClientError>, Self)> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some((Ok(event), self));
            }
            let body = self.body.as_mut()?;
            match body.next().await {
                Some(Ok(chunk)) => match self.decoder.feed(chunk.as_ref()) {
                    Ok(events) => self.ready.extend(events),
                    Err(e) => {
                        self.body = None;
                        return Some((Err(ClientError::Protocol(e.to_string())), self));
                    }
                },
                Some(Err(e)) => {
                    self.body = None;
                    return Some((Err(ClientError::from_reqwest(e)), self));
                }
                None => {
                    self.body = None;
                }
            }
        }
    }
}
