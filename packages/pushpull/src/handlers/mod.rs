pub mod duplex;
pub mod health;
pub mod stream;
pub mod updates;

// Re-export all handlers for easy route registration
pub use duplex::duplex_handler;
pub use health::{health_handler, health_live_handler, metrics_handler, ping_handler};
pub use stream::stream_handler;
pub use updates::{poll_handler, publish_handler};
