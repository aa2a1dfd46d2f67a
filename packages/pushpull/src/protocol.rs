//! JSON bodies shared by the server handlers and the client adapters.

use serde::{Deserialize, Serialize};
use update_hub::Update;

/// Body of `POST /update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub message: String,
}

/// Reply to `POST /update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub status: String,
    pub version: u64,
}

impl UpdateResponse {
    pub fn updated(version: u64) -> Self {
        Self {
            status: "updated".to_string(),
            version,
        }
    }
}

/// Query of `GET /poll`.
///
/// Without `last_seen` the caller has seen nothing yet, not even the initial
/// state, so the poll answers with the current state at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<u64>,
}

/// Reply to `GET /poll`.
///
/// `message` is `null` when the poll timed out; `timestamp` then echoes the
/// caller's `last_seen` so it can retry with the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    pub message: Option<String>,
    pub timestamp: u64,
}

impl PollResponse {
    pub fn no_update(last_seen: u64) -> Self {
        Self {
            message: None,
            timestamp: last_seen,
        }
    }
}

impl From<Update> for PollResponse {
    fn from(update: Update) -> Self {
        Self {
            message: Some(update.payload),
            timestamp: update.version,
        }
    }
}
