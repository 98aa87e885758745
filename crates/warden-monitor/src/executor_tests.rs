use super::*;
use crate::error::ProbeError;
use crate::probe::Probe;
use crate::types::HealthStatus;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use warden_config::{EndpointConfig, EndpointKind, TrackerConfig};

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Sleep(Duration),
}

/// Probe that replays queued behaviors, falling back to a default.
struct ScriptedProbe {
    default: Behavior,
    queue: Mutex<VecDeque<Behavior>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    fn new(default: Behavior) -> Arc<Self> {
        Arc::new(Self {
            default,
            queue: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn push(&self, behavior: Behavior) {
        self.queue.lock().push_back(behavior);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Http
    }

    async fn probe(&self, _endpoint: &Endpoint) -> Result<String, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.queue.lock().pop_front().unwrap_or(self.default);
        match behavior {
            Behavior::Succeed => Ok("ok".to_string()),
            Behavior::Fail => Err(ProbeError::Status(500)),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok("slow".to_string())
            }
        }
    }
}

struct Harness {
    executor: Arc<CheckExecutor>,
    tracker: Arc<StatusTracker>,
    metrics: Arc<MonitorMetrics>,
    events: mpsc::Receiver<AlertEvent>,
}

fn harness(probe: Arc<ScriptedProbe>, configure: impl FnOnce(&mut EndpointConfig)) -> Harness {
    let mut config = EndpointConfig::new("api-a", "http://api-a.internal/health");
    config.interval_secs = 10;
    config.timeout_secs = 10;
    configure(&mut config);

    let registry = Arc::new(EndpointRegistry::from_config(&[config], None).unwrap());
    let tracker = Arc::new(StatusTracker::new(&registry, TrackerConfig::default()).unwrap());
    let metrics = Arc::new(MonitorMetrics::new());
    let (tx, rx) = mpsc::channel(16);
    let executor = CheckExecutor::new(
        registry,
        ProbeSet::new().with_probe(probe),
        Arc::clone(&tracker),
        Arc::clone(&metrics),
        tx,
        4,
    )
    .unwrap();

    Harness {
        executor: Arc::new(executor),
        tracker,
        metrics,
        events: rx,
    }
}

#[tokio::test]
async fn test_manual_check_records_result() {
    let h = harness(ScriptedProbe::new(Behavior::Succeed), |_| {});
    let result = h
        .executor
        .run_check("api-a", &CancellationToken::new(), Trigger::Manual)
        .await
        .unwrap();

    assert_eq!(result.status, CheckStatus::Healthy);
    assert_eq!(result.detail.as_deref(), Some("ok"));
    let state = h.tracker.state("api-a").unwrap();
    assert_eq!(state.current_status, HealthStatus::Healthy);
    assert_eq!(h.metrics.get(Counter::ChecksTotal), 1);
    assert!(!h.executor.is_in_flight("api-a"));
}

#[tokio::test]
async fn test_probe_error_maps_to_unhealthy() {
    let h = harness(ScriptedProbe::new(Behavior::Fail), |_| {});
    let result = h
        .executor
        .run_check("api-a", &CancellationToken::new(), Trigger::Manual)
        .await
        .unwrap();

    assert_eq!(result.status, CheckStatus::Unhealthy);
    assert!(result.detail.unwrap().contains("500"));
    assert_eq!(h.metrics.get(Counter::CheckFailuresTotal), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_check_timeout_reports_unknown() {
    let h = harness(ScriptedProbe::new(Behavior::Sleep(Duration::from_secs(60))), |_| {});
    let result = h
        .executor
        .run_check("api-a", &CancellationToken::new(), Trigger::Manual)
        .await
        .unwrap();

    assert_eq!(result.status, CheckStatus::Unknown(UnknownReason::Timeout));
    assert_eq!(result.detail.as_deref(), Some("timeout"));
    assert_eq!(result.duration_ms, 10_000);

    let state = h.tracker.state("api-a").unwrap();
    assert_eq!(state.consecutive_failures, 1);
    assert_eq!(state.current_status, HealthStatus::Unknown);
    assert_eq!(h.metrics.get(Counter::CheckTimeoutsTotal), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_check_reports_unknown() {
    let h = harness(ScriptedProbe::new(Behavior::Sleep(Duration::from_secs(5))), |_| {});
    let cancel = CancellationToken::new();

    let executor = Arc::clone(&h.executor);
    let token = cancel.clone();
    let handle =
        tokio::spawn(async move { executor.run_check("api-a", &token, Trigger::Manual).await });
    tokio::task::yield_now().await;
    cancel.cancel();

    let result = handle.await.unwrap().unwrap();
    assert_eq!(result.status, CheckStatus::Unknown(UnknownReason::Cancelled));
    assert_eq!(result.detail.as_deref(), Some("cancelled"));
    assert_eq!(h.tracker.state("api-a").unwrap().consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_check_while_in_flight_is_rejected() {
    let h = harness(ScriptedProbe::new(Behavior::Sleep(Duration::from_secs(5))), |_| {});

    let executor = Arc::clone(&h.executor);
    let first = tokio::spawn(async move {
        executor
            .run_check("api-a", &CancellationToken::new(), Trigger::Manual)
            .await
    });
    tokio::task::yield_now().await;
    assert!(h.executor.is_in_flight("api-a"));

    let err = h
        .executor
        .run_check("api-a", &CancellationToken::new(), Trigger::Manual)
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::CheckInFlight(name) if name == "api-a"));

    assert!(first.await.unwrap().is_ok());
    assert_eq!(h.executor.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_success_is_degraded() {
    let h = harness(ScriptedProbe::new(Behavior::Sleep(Duration::from_secs(2))), |c| {
        c.degraded_threshold_ms = Some(1000);
    });
    let result = h
        .executor
        .run_check("api-a", &CancellationToken::new(), Trigger::Manual)
        .await
        .unwrap();

    assert_eq!(result.status, CheckStatus::Degraded);
    assert!(result.detail.unwrap().contains("1000ms threshold"));
}

#[tokio::test]
async fn test_transition_forwards_one_event() {
    let mut h = harness(ScriptedProbe::new(Behavior::Fail), |_| {});
    for _ in 0..4 {
        h.executor
            .run_check("api-a", &CancellationToken::new(), Trigger::Manual)
            .await
            .unwrap();
    }

    let event = h.events.try_recv().unwrap();
    assert_eq!(event.fingerprint, "api-a:unhealthy");
    assert!(h.events.try_recv().is_err());
    assert_eq!(h.metrics.get(Counter::AlertsFiringTotal), 1);
}

#[tokio::test]
async fn test_unknown_endpoint() {
    let h = harness(ScriptedProbe::new(Behavior::Succeed), |_| {});
    let err = h
        .executor
        .run_check("nope", &CancellationToken::new(), Trigger::Manual)
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::UnknownEndpoint(_)));
}

#[tokio::test(start_paused = true)]
async fn test_schedule_runs_on_interval() {
    let probe = ScriptedProbe::new(Behavior::Succeed);
    let h = harness(Arc::clone(&probe), |_| {});
    h.executor.spawn_schedules();

    tokio::time::sleep(Duration::from_secs(35)).await;

    assert_eq!(probe.calls(), 4);
    assert_eq!(h.tracker.state("api-a").unwrap().checks_total, 4);
    h.executor.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_schedule_skips_ticks_while_in_flight() {
    let probe = ScriptedProbe::new(Behavior::Sleep(Duration::from_secs(25)));
    let h = harness(Arc::clone(&probe), |c| c.timeout_secs = 60);
    h.executor.spawn_schedules();

    tokio::time::sleep(Duration::from_secs(35)).await;

    // t=0 starts a probe that finishes at t=25; t=10 and t=20 are skipped;
    // t=30 starts the next one.
    assert_eq!(probe.calls(), 2);
    assert_eq!(h.tracker.state("api-a").unwrap().checks_total, 1);
    assert_eq!(h.metrics.get(Counter::ChecksSkippedTotal), 2);
    h.executor.shutdown(Duration::from_secs(60)).await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_within_grace() {
    let probe = ScriptedProbe::new(Behavior::Sleep(Duration::from_secs(5)));
    let h = harness(Arc::clone(&probe), |_| {});
    h.executor.spawn_schedules();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.executor.is_in_flight("api-a"));

    h.executor.shutdown(Duration::from_secs(10)).await;

    let state = h.tracker.state("api-a").unwrap();
    assert_eq!(state.checks_total, 1);
    assert_eq!(state.current_status, HealthStatus::Healthy);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_after_grace() {
    let probe = ScriptedProbe::new(Behavior::Sleep(Duration::from_secs(8)));
    let h = harness(Arc::clone(&probe), |_| {});
    h.executor.spawn_schedules();
    tokio::time::sleep(Duration::from_secs(1)).await;

    h.executor.shutdown(Duration::from_secs(2)).await;

    // The abandoned probe is not a result.
    let state = h.tracker.state("api-a").unwrap();
    assert!(state.last_result.is_none());
    assert_eq!(state.checks_total, 0);
    assert_eq!(h.metrics.get(Counter::ChecksTotal), 0);
    assert_eq!(h.executor.in_flight_count(), 0);

    let err = h
        .executor
        .run_check("api-a", &CancellationToken::new(), Trigger::Manual)
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::NotRunning));
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_check_does_not_push_endpoint_over_threshold() {
    let probe = ScriptedProbe::new(Behavior::Sleep(Duration::from_secs(3600)));
    probe.push(Behavior::Fail);
    probe.push(Behavior::Fail);
    let mut h = harness(Arc::clone(&probe), |c| c.timeout_secs = 60);
    h.executor.spawn_schedules();

    // Failures at t=0 and t=10, the t=20 probe hangs.
    tokio::time::sleep(Duration::from_secs(25)).await;
    assert!(h.executor.is_in_flight("api-a"));

    h.executor.shutdown(Duration::ZERO).await;

    let state = h.tracker.state("api-a").unwrap();
    assert_eq!(state.consecutive_failures, 2);
    assert_eq!(state.current_status, HealthStatus::Unknown);
    assert_eq!(
        state.last_result.map(|r| r.status),
        Some(CheckStatus::Unhealthy)
    );
    assert_eq!(h.metrics.get(Counter::AlertsFiringTotal), 0);
    assert!(h.events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_manual_check() {
    let probe = ScriptedProbe::new(Behavior::Sleep(Duration::from_secs(5)));
    let h = harness(Arc::clone(&probe), |_| {});

    let executor = Arc::clone(&h.executor);
    let manual = tokio::spawn(async move {
        executor
            .run_check("api-a", &CancellationToken::new(), Trigger::Manual)
            .await
    });
    tokio::task::yield_now().await;
    assert!(h.executor.is_in_flight("api-a"));

    h.executor.shutdown(Duration::from_secs(10)).await;

    // Shutdown returned only after the manual probe was recorded.
    assert_eq!(h.tracker.state("api-a").unwrap().checks_total, 1);
    assert_eq!(h.executor.in_flight_count(), 0);
    let result = manual.await.unwrap().unwrap();
    assert_eq!(result.status, CheckStatus::Healthy);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abandons_manual_check_after_grace() {
    let probe = ScriptedProbe::new(Behavior::Sleep(Duration::from_secs(30)));
    let h = harness(Arc::clone(&probe), |c| c.timeout_secs = 60);

    let executor = Arc::clone(&h.executor);
    let manual = tokio::spawn(async move {
        executor
            .run_check("api-a", &CancellationToken::new(), Trigger::Manual)
            .await
    });
    tokio::task::yield_now().await;

    h.executor.shutdown(Duration::from_secs(2)).await;

    let err = manual.await.unwrap().unwrap_err();
    assert!(matches!(err, MonitorError::NotRunning));
    assert_eq!(h.executor.in_flight_count(), 0);
    assert_eq!(h.tracker.state("api-a").unwrap().checks_total, 0);
}

#[tokio::test]
async fn test_events_before_start_never_block() {
    let registry = Arc::new(
        EndpointRegistry::from_config(
            &[EndpointConfig::new("api-a", "http://api-a.internal/health")],
            None,
        )
        .unwrap(),
    );
    let tracker = Arc::new(StatusTracker::new(&registry, TrackerConfig::default()).unwrap());
    let metrics = Arc::new(MonitorMetrics::new());
    let (tx, mut rx) = mpsc::channel(1);
    let probe = ScriptedProbe::new(Behavior::Fail);
    for behavior in [Behavior::Fail, Behavior::Fail, Behavior::Fail, Behavior::Succeed] {
        probe.push(behavior);
    }
    let executor = CheckExecutor::new(
        registry,
        ProbeSet::new().with_probe(probe),
        tracker,
        Arc::clone(&metrics),
        tx,
        4,
    )
    .unwrap();

    // Three transitions with nobody reading a one-slot queue.
    for _ in 0..7 {
        executor
            .run_check("api-a", &CancellationToken::new(), Trigger::Manual)
            .await
            .unwrap();
    }

    assert_eq!(metrics.get(Counter::AlertsFiringTotal), 2);
    assert_eq!(metrics.get(Counter::AlertsResolvedTotal), 1);
    assert_eq!(rx.try_recv().unwrap().fingerprint, "api-a:unhealthy");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_queued_behaviors() {
    let probe = ScriptedProbe::new(Behavior::Succeed);
    probe.push(Behavior::Fail);
    let h = harness(Arc::clone(&probe), |_| {});
    let cancel = CancellationToken::new();

    let first = h.executor.run_check("api-a", &cancel, Trigger::Manual).await.unwrap();
    let second = h.executor.run_check("api-a", &cancel, Trigger::Manual).await.unwrap();
    assert_eq!(first.status, CheckStatus::Unhealthy);
    assert_eq!(second.status, CheckStatus::Healthy);
}

#[test]
fn test_zero_workers_rejected() {
    let registry = Arc::new(EndpointRegistry::default());
    let tracker = Arc::new(StatusTracker::new(&registry, TrackerConfig::default()).unwrap());
    let (tx, _rx) = mpsc::channel(1);
    let result = CheckExecutor::new(
        registry,
        ProbeSet::new(),
        tracker,
        Arc::new(MonitorMetrics::new()),
        tx,
        0,
    );
    assert!(matches!(result, Err(MonitorError::Config(_))));
}
