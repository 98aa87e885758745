//! Signal handling for the daemon process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::DaemonError;

/// Signal type for daemon control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonSignal {
    /// Graceful shutdown (SIGTERM, SIGINT).
    Shutdown,
    /// Stop without waiting for in-flight probes (SIGQUIT).
    Terminate,
}

impl std::fmt::Display for DaemonSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonSignal::Shutdown => write!(f, "SHUTDOWN"),
            DaemonSignal::Terminate => write!(f, "TERMINATE"),
        }
    }
}

/// Signal handler for managing daemon lifecycle signals.
#[derive(Clone)]
pub struct SignalHandler {
    sender: broadcast::Sender<DaemonSignal>,
    shutdown_requested: Arc<AtomicBool>,
    terminate_requested: Arc<AtomicBool>,
}

impl SignalHandler {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            sender,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            terminate_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonSignal> {
        self.sender.subscribe()
    }

    pub fn send(&self, signal: DaemonSignal) {
        debug!("Sending signal: {}", signal);

        self.shutdown_requested.store(true, Ordering::SeqCst);
        if signal == DaemonSignal::Terminate {
            self.terminate_requested.store(true, Ordering::SeqCst);
        }

        let _ = self.sender.send(signal);
    }

    pub fn request_shutdown(&self) {
        self.send(DaemonSignal::Shutdown);
    }

    pub fn request_terminate(&self) {
        self.send(DaemonSignal::Terminate);
    }

    /// True after either signal.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn is_terminate_requested(&self) -> bool {
        self.terminate_requested.load(Ordering::SeqCst)
    }

    /// Install OS signal handlers (Unix only).
    #[cfg(unix)]
    pub fn setup_os_signals(&self) -> Result<(), DaemonError> {
        use tokio::signal::unix::{SignalKind, signal};

        let kinds = [
            (SignalKind::terminate(), "SIGTERM", DaemonSignal::Shutdown),
            (SignalKind::interrupt(), "SIGINT", DaemonSignal::Shutdown),
            (SignalKind::quit(), "SIGQUIT", DaemonSignal::Terminate),
        ];

        for (kind, name, daemon_signal) in kinds {
            let mut stream = signal(kind).map_err(|e| DaemonError::SignalSetup(e.to_string()))?;
            let handler = self.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    info!("Received {}", name);
                    handler.send(daemon_signal);
                }
            });
        }

        info!("OS signal handlers installed (SIGTERM, SIGINT, SIGQUIT)");
        Ok(())
    }

    /// Install OS signal handlers (non-Unix fallback).
    #[cfg(not(unix))]
    pub fn setup_os_signals(&self) -> Result<(), DaemonError> {
        let handler = self.clone();

        // Only Ctrl+C is available on non-Unix
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received Ctrl+C");
                handler.request_shutdown();
            }
        });

        info!("OS signal handlers installed (Ctrl+C only)");
        Ok(())
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
