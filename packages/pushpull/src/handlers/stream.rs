use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;

use crate::events::StreamSession;
use crate::server::AppState;

/// `GET /stream`: one `data:` event per interval until the client disconnects.
pub async fn stream_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = StreamSession::new(state.config.stream_interval, Some(state.metrics.clone()));

    let events = session
        .into_stream()
        .map(|line| Ok(Event::default().data(line)))
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(events)
}
