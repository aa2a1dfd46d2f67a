//! Update Hub - versioned shared state for "wait for the next change" consumers
//!
//! A [`NotificationHub`] owns exactly one [`Update`]: the current payload and a
//! version that grows by one on every publish. Consumers never watch a flag;
//! they hand in the last version they observed and are released as soon as the
//! hub's version is past it. An update published before a consumer starts
//! waiting is therefore never missed, and any number of publishes in a row
//! coalesce to the latest state.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use update_hub::{NotificationHub, WaitOutcome};
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = NotificationHub::new("Initial message");
//!
//!     hub.publish("A");
//!     hub.publish("B");
//!
//!     match hub.wait_for_update(0, Duration::from_secs(15)).await {
//!         WaitOutcome::Updated(update) => {
//!             assert_eq!(update.payload, "B");
//!             assert_eq!(update.version, 2);
//!         }
//!         WaitOutcome::TimedOut { .. } => unreachable!(),
//!     }
//! }
//! ```

mod hub;
mod state;

pub use hub::{NotificationHub, WaitOutcome, Waiter};
pub use state::Update;
