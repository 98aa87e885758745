//! The monitor facade wiring every component together.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use warden_config::Config;

use crate::error::MonitorError;
use crate::executor::CheckExecutor;
use crate::fanout::FanOut;
use crate::metrics::MonitorMetrics;
use crate::probe::ProbeSet;
use crate::registry::EndpointRegistry;
use crate::router::{AlertRouter, RouterDriver};
use crate::sink::AlertSink;
use crate::snapshot::{MonitorSnapshot, RouterStats};
use crate::tracker::StatusTracker;
use crate::types::{CheckResult, HealthStatus, Trigger};

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;

/// Alert events buffered between the executor and the router task.
const EVENT_QUEUE: usize = 1024;

/// Aggregate health of the monitoring core.
#[derive(Debug, Clone, Serialize)]
pub struct CoreHealth {
    pub status: HealthStatus,
    pub ready: bool,
    pub running: bool,
    pub endpoints: usize,
    pub status_counts: BTreeMap<HealthStatus, usize>,
    pub checks_in_flight: usize,
}

pub struct Monitor {
    registry: Arc<EndpointRegistry>,
    tracker: Arc<StatusTracker>,
    executor: Arc<CheckExecutor>,
    fanout: Arc<FanOut>,
    metrics: Arc<MonitorMetrics>,
    driver: Mutex<Option<RouterDriver>>,
    router_task: Mutex<Option<JoinHandle<()>>>,
    router_shutdown: CancellationToken,
    subscriber_buffer: usize,
}

impl Monitor {
    pub fn new(config: &Config, sink: Arc<dyn AlertSink>) -> Result<Self, MonitorError> {
        Self::with_probes(config, sink, ProbeSet::standard())
    }

    pub fn with_probes(
        config: &Config,
        sink: Arc<dyn AlertSink>,
        probes: ProbeSet,
    ) -> Result<Self, MonitorError> {
        let metrics = Arc::new(MonitorMetrics::new());
        let registry = Arc::new(EndpointRegistry::from_config(
            &config.endpoints,
            config.executor.degraded_threshold_ms,
        )?);
        let tracker = Arc::new(StatusTracker::new(&registry, config.tracker)?);
        let router = AlertRouter::from_config(&config.alerting, Arc::clone(&metrics))?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let (stats_tx, stats_rx) = watch::channel(RouterStats::default());

        info!("Delivering alerts through the {} sink", sink.name());
        let fanout = Arc::new(FanOut::new(
            &config.fanout,
            sink,
            Arc::clone(&registry),
            Arc::clone(&tracker),
            Arc::clone(&metrics),
            stats_rx,
        )?);

        let executor = Arc::new(CheckExecutor::new(
            Arc::clone(&registry),
            probes,
            Arc::clone(&tracker),
            Arc::clone(&metrics),
            events_tx,
            config.executor.max_concurrent_probes,
        )?);

        let router_shutdown = CancellationToken::new();
        let driver = RouterDriver::new(
            router,
            events_rx,
            Arc::clone(&fanout),
            stats_tx,
            router_shutdown.clone(),
        );

        Ok(Self {
            registry,
            tracker,
            executor,
            fanout,
            metrics,
            driver: Mutex::new(Some(driver)),
            router_task: Mutex::new(None),
            router_shutdown,
            subscriber_buffer: config.fanout.subscriber_buffer,
        })
    }

    /// Spawn the router task and the endpoint schedules.
    pub fn start(&self) -> Result<(), MonitorError> {
        let driver = self.driver.lock().take().ok_or(MonitorError::AlreadyRunning)?;
        *self.router_task.lock() = Some(tokio::spawn(driver.run()));
        self.executor.spawn_schedules();
        info!("Monitor started with {} endpoints", self.registry.len());
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.router_task.lock().is_some()
    }

    /// Run one check now, outside the schedule.
    pub async fn perform_check(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<CheckResult, MonitorError> {
        self.executor.run_check(name, cancel, Trigger::Manual).await
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.fanout.snapshot()
    }

    pub fn is_ready(&self) -> bool {
        self.tracker.is_ready()
    }

    pub fn core_health(&self) -> CoreHealth {
        let snapshot = self.snapshot();
        CoreHealth {
            status: snapshot.overall_status(),
            ready: snapshot.ready,
            running: self.is_running(),
            endpoints: snapshot.endpoints.len(),
            status_counts: snapshot.status_counts,
            checks_in_flight: self.executor.in_flight_count(),
        }
    }

    /// Prometheus text exposition. `detail` adds the per-endpoint series.
    pub fn render_metrics(&self, detail: bool) -> String {
        self.metrics.render(&self.snapshot(), detail)
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn fanout(&self) -> &Arc<FanOut> {
        &self.fanout
    }

    pub fn metrics(&self) -> &Arc<MonitorMetrics> {
        &self.metrics
    }

    /// Queue length for new live subscribers.
    pub fn subscriber_buffer(&self) -> usize {
        self.subscriber_buffer
    }

    /// Stop the schedules, let in-flight probes finish within `grace`, flush
    /// whatever groups are due, then close fan-out.
    pub async fn shutdown(&self, grace: Duration) {
        info!("Shutting down monitor (grace {:?})", grace);
        self.executor.shutdown(grace).await;

        self.router_shutdown.cancel();
        let task = self.router_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Alert router task failed: {}", e);
            }
        }

        self.fanout.close().await;
        info!("Monitor stopped");
    }
}
