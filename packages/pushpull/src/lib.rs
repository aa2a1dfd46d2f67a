//! Pushpull - deliver one shared piece of state to clients over three transports
//!
//! - `POST /update` replaces the state and wakes every parked long-poll
//! - `GET /poll` long-polls for a version newer than the caller's
//! - `GET /stream` emits a server-time event once per interval
//! - `GET /ws` runs a duplex request/reply session
//!
//! The matching client adapters live in [`cli`].

pub mod cli;
pub mod config;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod ws;
