//! Duplex Session Endpoint
//!
//! One websocket connection per session:
//! - Connecting → Open on accept, Open → Closed on disconnect, terminator or error
//! - Every inbound text frame is answered through a pluggable [`ReplyPolicy`]
//! - Failures end the session; they never leave the connection task

mod policy;
mod session;

pub use policy::{Echo, FnPolicy, OperatorConsole, ReplyPolicy, policy_for, reply_fn};
pub use session::{CloseReason, DuplexSession, Inbound, SessionError, SessionState};
