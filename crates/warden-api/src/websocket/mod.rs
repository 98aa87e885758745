//! Real-time gateway over WebSocket.
//!
//! Each connection opens a [`warden_monitor::GatewaySession`]; client
//! messages map one-to-one onto session operations and alerts for
//! subscribed groups are pushed as they are flushed.

mod handler;
mod message;

pub use handler::ws_handler;
pub use message::{ClientMessage, ServerMessage};
