//! # Warden API
//!
//! External interface for the Warden monitor.
//!
//! - **HTTP**: health, readiness, Prometheus metrics, snapshots and
//!   on-demand checks
//! - **WebSocket**: the real-time gateway (subscriptions, live alerts,
//!   manual triggers)
//!
//! Callers authenticate with bearer tokens from `[[api.tokens]]`. A request
//! without a token is anonymous and may only read.

pub mod auth;
pub mod error;
pub mod http;
pub mod server;
pub mod state;
pub mod websocket;

pub use error::ApiError;
pub use http::routes::create_router;
pub use server::ApiServer;
pub use state::AppState;
pub use websocket::{ClientMessage, ServerMessage};

#[cfg(test)]
mod testing;
