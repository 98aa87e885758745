//! Check executor.
//!
//! One interval timer per endpoint feeds a semaphore-bounded probe pool.
//! A per-endpoint in-flight set keeps at most one probe outstanding per
//! endpoint, for scheduled and manual checks alike.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashSet;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::MonitorError;
use crate::metrics::{Counter, MonitorMetrics};
use crate::probe::ProbeSet;
use crate::registry::EndpointRegistry;
use crate::tracker::StatusTracker;
use crate::types::{
    AlertEvent, AlertState, CheckResult, CheckStatus, Endpoint, Trigger, UnknownReason,
};

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

/// Removes the endpoint from the in-flight set when dropped.
struct InFlightGuard<'a> {
    set: &'a DashSet<String>,
    name: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a DashSet<String>, name: &str) -> Option<Self> {
        set.insert(name.to_string()).then(|| Self {
            set,
            name: name.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.name);
    }
}

pub struct CheckExecutor {
    registry: Arc<EndpointRegistry>,
    probes: ProbeSet,
    tracker: Arc<StatusTracker>,
    metrics: Arc<MonitorMetrics>,
    events: mpsc::Sender<AlertEvent>,
    permits: Arc<Semaphore>,
    in_flight: DashSet<String>,
    tasks: TaskTracker,
    /// Set once the schedules run; until then nothing drains `events`.
    started: AtomicBool,
    /// Stops the schedules.
    stop: CancellationToken,
    /// Cancels probes still running once the shutdown grace period ends.
    abort: CancellationToken,
}

impl CheckExecutor {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        probes: ProbeSet,
        tracker: Arc<StatusTracker>,
        metrics: Arc<MonitorMetrics>,
        events: mpsc::Sender<AlertEvent>,
        max_concurrent_probes: usize,
    ) -> Result<Self, MonitorError> {
        if max_concurrent_probes == 0 {
            return Err(MonitorError::Config(
                "max_concurrent_probes must be positive".to_string(),
            ));
        }

        Ok(Self {
            registry,
            probes,
            tracker,
            metrics,
            events,
            permits: Arc::new(Semaphore::new(max_concurrent_probes)),
            in_flight: DashSet::new(),
            tasks: TaskTracker::new(),
            started: AtomicBool::new(false),
            stop: CancellationToken::new(),
            abort: CancellationToken::new(),
        })
    }

    /// Start one interval timer per registered endpoint.
    pub fn spawn_schedules(self: &Arc<Self>) {
        self.started.store(true, Ordering::SeqCst);
        for endpoint in self.registry.endpoints() {
            let executor = Arc::clone(self);
            let endpoint = Arc::clone(endpoint);
            self.tasks.spawn(executor.schedule_loop(endpoint));
        }
        info!(
            "Scheduled {} endpoints with {} probe workers",
            self.registry.len(),
            self.permits.available_permits()
        );
    }

    async fn schedule_loop(self: Arc<Self>, endpoint: Arc<Endpoint>) {
        let mut ticker = tokio::time::interval(endpoint.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.in_flight.contains(&endpoint.name) {
                self.metrics.inc(Counter::ChecksSkippedTotal);
                warn!(
                    "Skipping scheduled check for {}: previous probe still in flight",
                    endpoint.name
                );
                continue;
            }

            let executor = Arc::clone(&self);
            let name = endpoint.name.clone();
            self.tasks.spawn(async move {
                let cancel = CancellationToken::new();
                match executor.run_check(&name, &cancel, Trigger::Scheduled).await {
                    Ok(_) => {}
                    Err(MonitorError::CheckInFlight(_)) => {
                        executor.metrics.inc(Counter::ChecksSkippedTotal);
                        debug!("Scheduled check for {} lost the race to another probe", name);
                    }
                    Err(MonitorError::NotRunning) => {}
                    Err(e) => warn!("Scheduled check for {} failed: {}", name, e),
                }
            });
        }

        debug!("Schedule for {} stopped", endpoint.name);
    }

    /// Run one check, record it in the tracker and forward any alert.
    ///
    /// Fails with [`MonitorError::CheckInFlight`] when a probe for the same
    /// endpoint is already running, and with [`MonitorError::NotRunning`]
    /// when shutdown stops the probe. A check stopped by `cancel` is recorded
    /// as `Unknown(cancelled)`.
    pub async fn run_check(
        &self,
        name: &str,
        cancel: &CancellationToken,
        trigger: Trigger,
    ) -> Result<CheckResult, MonitorError> {
        // Tracked so shutdown drains manual checks along with scheduled ones.
        self.tasks.track_future(self.check(name, cancel, trigger)).await
    }

    async fn check(
        &self,
        name: &str,
        cancel: &CancellationToken,
        trigger: Trigger,
    ) -> Result<CheckResult, MonitorError> {
        if self.stop.is_cancelled() {
            return Err(MonitorError::NotRunning);
        }
        let endpoint = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| MonitorError::UnknownEndpoint(name.to_string()))?;
        let _guard = InFlightGuard::acquire(&self.in_flight, name)
            .ok_or_else(|| MonitorError::CheckInFlight(name.to_string()))?;

        let Some(result) = self.execute(&endpoint, cancel).await else {
            debug!("{} check {} abandoned at shutdown", trigger, name);
            return Err(MonitorError::NotRunning);
        };
        debug!(
            "{} check {} -> {:?} in {}ms",
            trigger, name, result.status, result.duration_ms
        );

        self.metrics.inc(Counter::ChecksTotal);
        if !result.status.is_healthy() {
            self.metrics.inc(Counter::CheckFailuresTotal);
        }

        // Forwarded while still holding the in-flight guard so events for one
        // endpoint reach the router in transition order.
        if let Some(event) = self.tracker.record(result.clone())? {
            match event.state {
                AlertState::Firing => self.metrics.inc(Counter::AlertsFiringTotal),
                AlertState::Resolved => self.metrics.inc(Counter::AlertsResolvedTotal),
            }
            self.forward(event).await;
        }

        Ok(result)
    }

    /// Hand an event to the router. Before the schedules start there is no
    /// reader, so a full queue drops the event instead of blocking.
    async fn forward(&self, event: AlertEvent) {
        let endpoint = event.endpoint.clone();
        if self.started.load(Ordering::SeqCst) {
            if self.events.send(event).await.is_err() {
                warn!("Alert router has stopped, dropping alert for {}", endpoint);
            }
            return;
        }

        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Alert queue full before start, dropping alert for {}", endpoint);
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Alert router has stopped, dropping alert for {}", endpoint);
            }
        }
    }

    /// `None` when shutdown aborted the probe.
    async fn execute(&self, endpoint: &Endpoint, cancel: &CancellationToken) -> Option<CheckResult> {
        let queued = Instant::now();
        let permit = tokio::select! {
            biased;
            _ = self.abort.cancelled() => return None,
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            return Some(unknown(endpoint, UnknownReason::Cancelled, queued.elapsed()));
        };

        let probe = match self.probes.get(endpoint.kind) {
            Ok(probe) => Arc::clone(probe),
            Err(e) => {
                return Some(
                    CheckResult::new(&endpoint.name, CheckStatus::Unhealthy)
                        .with_detail(e.to_string()),
                );
            }
        };

        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = self.abort.cancelled() => return None,
            _ = cancel.cancelled() => None,
            res = tokio::time::timeout(endpoint.timeout, probe.probe(endpoint)) => Some(res),
        };
        let elapsed = started.elapsed();

        let result = match outcome {
            None => unknown(endpoint, UnknownReason::Cancelled, elapsed),
            Some(Err(_)) => {
                self.metrics.inc(Counter::CheckTimeoutsTotal);
                unknown(endpoint, UnknownReason::Timeout, elapsed)
            }
            Some(Ok(Err(e))) => CheckResult::new(&endpoint.name, CheckStatus::Unhealthy)
                .with_duration(elapsed)
                .with_detail(e.to_string()),
            Some(Ok(Ok(detail))) => match endpoint.degraded_after {
                Some(limit) if elapsed > limit => {
                    CheckResult::new(&endpoint.name, CheckStatus::Degraded)
                        .with_duration(elapsed)
                        .with_detail(format!(
                            "{} after {}ms, over the {}ms threshold",
                            detail,
                            elapsed.as_millis(),
                            limit.as_millis()
                        ))
                }
                _ => CheckResult::new(&endpoint.name, CheckStatus::Healthy)
                    .with_duration(elapsed)
                    .with_detail(detail),
            },
        };
        Some(result)
    }

    pub fn is_in_flight(&self, name: &str) -> bool {
        self.in_flight.contains(name)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Stop the schedules and wait up to `grace` for running probes, manual
    /// ones included, then abandon whatever is left. Abandoned probes leave
    /// endpoint state untouched.
    pub async fn shutdown(&self, grace: Duration) {
        self.stop.cancel();
        self.tasks.close();

        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            warn!(
                "{} probes still running after {:?}, cancelling",
                self.in_flight.len(),
                grace
            );
        }
        self.abort.cancel();
        self.tasks.wait().await;

        info!("Check executor stopped");
    }
}

fn unknown(endpoint: &Endpoint, reason: UnknownReason, elapsed: Duration) -> CheckResult {
    CheckResult::new(&endpoint.name, CheckStatus::Unknown(reason))
        .with_duration(elapsed)
        .with_detail(reason.to_string())
}
