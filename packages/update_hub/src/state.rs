use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single piece of shared state held by a hub.
///
/// `version` starts at 0 for the initial payload and is bumped on every
/// publish, including publishes that repeat the previous payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub payload: String,
    pub version: u64,
    pub published_at: DateTime<Utc>,
}

impl Update {
    pub(crate) fn initial(payload: String) -> Self {
        Self {
            payload,
            version: 0,
            published_at: Utc::now(),
        }
    }

    /// Replace the payload and advance the version in one step.
    pub(crate) fn advance(&mut self, payload: String) {
        self.payload = payload;
        self.version += 1;
        self.published_at = Utc::now();
    }

    /// Whether a consumer that last saw `last_seen` has anything new to read.
    pub fn is_newer_than(&self, last_seen: u64) -> bool {
        self.version > last_seen
    }
}
