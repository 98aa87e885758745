//! Daemon-related errors.

use thiserror::Error;
use warden_api::ApiError;
use warden_monitor::MonitorError;

/// Errors that can occur during daemon operations.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Failed to set up signal handlers.
    #[error("Failed to set up signal handlers: {0}")]
    SignalSetup(String),

    /// Invalid daemon state transition.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: DaemonState, to: DaemonState },

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

/// Daemon lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DaemonState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    ShuttingDown = 3,
}

impl From<u8> for DaemonState {
    fn from(v: u8) -> Self {
        match v {
            1 => DaemonState::Starting,
            2 => DaemonState::Running,
            3 => DaemonState::ShuttingDown,
            _ => DaemonState::Stopped,
        }
    }
}

impl std::fmt::Display for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonState::Stopped => write!(f, "stopped"),
            DaemonState::Starting => write!(f, "starting"),
            DaemonState::Running => write!(f, "running"),
            DaemonState::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}
