//! Monitor errors.

use thiserror::Error;
use warden_config::Capability;

/// Monitor error types.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Invalid endpoint, routing or threshold configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No endpoint is registered under this name.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// A probe for this endpoint is already running.
    #[error("Check already in flight for endpoint: {0}")]
    CheckInFlight(String),

    /// The subscriber id was never registered or has disconnected.
    #[error("Unknown subscriber: {0}")]
    UnknownSubscriber(String),

    /// The caller lacks a capability required by the operation.
    #[error("Missing capability: {capability}")]
    Forbidden { capability: Capability },

    /// Receiver delivery failed.
    #[error("Alert delivery to {receiver} failed: {reason}")]
    Delivery { receiver: String, reason: String },

    /// The monitor is stopping or was never started.
    #[error("Monitor is not running")]
    NotRunning,

    /// The monitor was already started.
    #[error("Monitor is already running")]
    AlreadyRunning,
}

impl MonitorError {
    /// Stable machine-readable kind.
    pub fn code(&self) -> &'static str {
        match self {
            MonitorError::Config(_) => "invalid_config",
            MonitorError::UnknownEndpoint(_) => "unknown_endpoint",
            MonitorError::CheckInFlight(_) => "check_in_flight",
            MonitorError::UnknownSubscriber(_) => "unknown_subscriber",
            MonitorError::Forbidden { .. } => "forbidden",
            MonitorError::Delivery { .. } => "delivery_failed",
            MonitorError::NotRunning => "not_running",
            MonitorError::AlreadyRunning => "already_running",
        }
    }
}

/// Failure reasons reported by a probe. Converted to a check status by the
/// executor and never surfaced past it.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(String),

    #[error("no probe registered for kind {0}")]
    Unsupported(String),
}
