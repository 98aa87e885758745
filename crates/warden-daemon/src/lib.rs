//! # Warden Daemon
//!
//! Runs the monitor and its API as one process.
//!
//! ## Features
//!
//! - **Lifecycle**: start the monitor and API server, stop them in order
//! - **Signal Handling**: SIGTERM/SIGINT for graceful shutdown, SIGQUIT to
//!   stop without waiting for in-flight probes

pub mod daemon;
pub mod error;
pub mod signal;

pub use daemon::Daemon;
pub use error::{DaemonError, DaemonState};
pub use signal::{DaemonSignal, SignalHandler};
