//! Daemon lifecycle: monitor plus API, stopped in order on a signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use warden_api::{ApiServer, AppState};
use warden_config::Config;
use warden_monitor::{AlertSink, Monitor};

use crate::error::{DaemonError, DaemonState};
use crate::signal::{DaemonSignal, SignalHandler};

pub struct Daemon {
    config: Config,
    monitor: Arc<Monitor>,
    state: AtomicU8,
    signal_handler: SignalHandler,
}

impl Daemon {
    /// Build the monitor from `config`, delivering alerts to `sink`.
    pub fn new(config: Config, sink: Arc<dyn AlertSink>) -> Result<Self, DaemonError> {
        let monitor = Monitor::new(&config, sink)?;
        Ok(Self::with_monitor(config, Arc::new(monitor)))
    }

    pub fn with_monitor(config: Config, monitor: Arc<Monitor>) -> Self {
        Self {
            config,
            monitor,
            state: AtomicU8::new(DaemonState::Stopped as u8),
            signal_handler: SignalHandler::new(),
        }
    }

    pub fn state(&self) -> DaemonState {
        DaemonState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == DaemonState::Running
    }

    pub fn signal_handler(&self) -> &SignalHandler {
        &self.signal_handler
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    fn transition(&self, from: DaemonState, to: DaemonState) -> Result<(), DaemonError> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|current| DaemonError::InvalidStateTransition {
                from: DaemonState::from(current),
                to,
            })
    }

    /// Install OS signal handlers and run until one arrives.
    pub async fn run(&self) -> Result<(), DaemonError> {
        self.signal_handler.setup_os_signals()?;
        self.serve().await
    }

    /// Run until a signal reaches [`Self::signal_handler`]. Does not install
    /// OS handlers.
    pub async fn serve(&self) -> Result<(), DaemonError> {
        self.transition(DaemonState::Stopped, DaemonState::Starting)?;
        info!("Daemon starting...");
        let mut signals = self.signal_handler.subscribe();

        let api_state = Arc::new(AppState::new(Arc::clone(&self.monitor), &self.config.api));
        let server = match ApiServer::bind(&self.config.server, api_state).await {
            Ok(server) => server,
            Err(e) => {
                self.state.store(DaemonState::Stopped as u8, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        if let Err(e) = self.monitor.start() {
            self.state.store(DaemonState::Stopped as u8, Ordering::SeqCst);
            return Err(e.into());
        }

        let api_shutdown = CancellationToken::new();
        let mut api_task = tokio::spawn(server.serve(api_shutdown.clone()));

        self.state.store(DaemonState::Running as u8, Ordering::SeqCst);
        info!("Daemon started (PID: {})", std::process::id());

        let signal = if self.signal_handler.is_terminate_requested() {
            DaemonSignal::Terminate
        } else if self.signal_handler.is_shutdown_requested() {
            DaemonSignal::Shutdown
        } else {
            tokio::select! {
                received = signals.recv() => received.unwrap_or(DaemonSignal::Shutdown),
                result = &mut api_task => {
                    match result {
                        Ok(Ok(())) => warn!("API server exited unexpectedly"),
                        Ok(Err(e)) => warn!("API server failed: {}", e),
                        Err(e) => warn!("API server task failed: {}", e),
                    }
                    DaemonSignal::Shutdown
                }
            }
        };

        self.state.store(DaemonState::ShuttingDown as u8, Ordering::SeqCst);
        let grace = match signal {
            DaemonSignal::Shutdown => Duration::from_secs(self.config.daemon.shutdown_grace_secs),
            DaemonSignal::Terminate => Duration::ZERO,
        };
        info!("Daemon shutting down on {} (grace {:?})", signal, grace);

        // Stop accepting connections first. Live sockets close once fan-out
        // drops their alert queues.
        api_shutdown.cancel();
        self.monitor.shutdown(grace).await;

        if !api_task.is_finished() {
            match tokio::time::timeout(grace.max(Duration::from_secs(1)), &mut api_task).await {
                Ok(_) => {}
                Err(_) => {
                    warn!("API connections still open after grace period, aborting");
                    api_task.abort();
                }
            }
        }

        self.state.store(DaemonState::Stopped as u8, Ordering::SeqCst);
        info!("Daemon stopped");
        Ok(())
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
