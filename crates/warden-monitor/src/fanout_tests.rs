use super::*;
use crate::sink::{LogSink, MockAlertSink};
use crate::types::{AlertEvent, AlertState, CheckResult, CheckStatus, HealthStatus, Labels};
use async_trait::async_trait;
use warden_config::{EndpointConfig, EndpointKind, TrackerConfig};

struct Harness {
    fanout: FanOut,
    tracker: Arc<StatusTracker>,
    metrics: Arc<MonitorMetrics>,
    stats: watch::Sender<RouterStats>,
}

fn harness(sink: Arc<dyn AlertSink>) -> Harness {
    let configs = [
        EndpointConfig::new("api-a", "http://api-a.internal/health").with_label("service", "checkout"),
        EndpointConfig::new("db", "db.internal:5432").with_kind(EndpointKind::Tcp),
    ];
    let registry = Arc::new(EndpointRegistry::from_config(&configs, None).unwrap());
    let tracker = Arc::new(StatusTracker::new(&registry, TrackerConfig::default()).unwrap());
    let metrics = Arc::new(MonitorMetrics::new());
    let (stats, stats_rx) = watch::channel(RouterStats::default());

    let fanout = FanOut::new(
        &FanOutConfig::default(),
        sink,
        registry,
        Arc::clone(&tracker),
        Arc::clone(&metrics),
        stats_rx,
    )
    .unwrap();

    Harness {
        fanout,
        tracker,
        metrics,
        stats,
    }
}

fn notification(receiver: &str) -> Notification {
    let alert = AlertEvent {
        fingerprint: "api-a:unhealthy".to_string(),
        endpoint: "api-a".to_string(),
        state: AlertState::Firing,
        status: HealthStatus::Unhealthy,
        labels: Labels::from([("severity".to_string(), "critical".to_string())]),
        annotations: Labels::new(),
        starts_at: Utc::now(),
        resolved_at: None,
        supersedes: None,
    };
    Notification {
        receiver: receiver.to_string(),
        group_key: format!("{}:{{}}", receiver),
        group_labels: Labels::new(),
        firing: vec![alert],
        resolved: Vec::new(),
        timestamp: Utc::now(),
    }
}

struct SlowSink;

#[async_trait]
impl AlertSink for SlowSink {
    fn name(&self) -> &str {
        "slow"
    }

    async fn deliver(&self, _receiver: &str, _notification: &Notification) -> Result<(), MonitorError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_dispatch_delivers_to_sink() {
    let mut sink = MockAlertSink::new();
    sink.expect_deliver()
        .withf(|receiver, n| receiver == "critical-alerts" && n.firing.len() == 1)
        .times(1)
        .returning(|_, _| Ok(()));

    let h = harness(Arc::new(sink));
    h.fanout.dispatch(notification("critical-alerts"));
    h.fanout.close().await;

    assert_eq!(h.metrics.get(Counter::DeliveryFailuresTotal), 0);
}

#[tokio::test]
async fn test_delivery_failure_is_counted() {
    let mut sink = MockAlertSink::new();
    sink.expect_deliver().times(1).returning(|receiver, _| {
        Err(MonitorError::Delivery {
            receiver: receiver.to_string(),
            reason: "connection refused".to_string(),
        })
    });

    let h = harness(Arc::new(sink));
    h.fanout.dispatch(notification("critical-alerts"));
    h.fanout.close().await;

    assert_eq!(h.metrics.get(Counter::DeliveryFailuresTotal), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delivery_timeout_is_counted() {
    let h = harness(Arc::new(SlowSink));
    h.fanout.dispatch(notification("critical-alerts"));
    h.fanout.close().await;

    assert_eq!(h.metrics.get(Counter::DeliveryFailuresTotal), 1);
}

#[tokio::test]
async fn test_subscribers_receive_their_group_once() {
    let h = harness(Arc::new(LogSink));
    let (tx_a, mut rx_a) = mpsc::channel(4);
    let (tx_b, mut rx_b) = mpsc::channel(4);
    h.fanout.register("a", tx_a).unwrap();
    h.fanout.register("b", tx_b).unwrap();

    assert!(h.fanout.subscribe("a", "critical-alerts").unwrap());
    assert!(!h.fanout.subscribe("a", "critical-alerts").unwrap());
    h.fanout.subscribe("b", "warning-alerts").unwrap();

    h.fanout.dispatch(notification("critical-alerts"));

    let received = rx_a.try_recv().unwrap();
    assert_eq!(received.receiver, "critical-alerts");
    assert!(rx_a.try_recv().is_err());
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn test_full_queue_drops_without_blocking_others() {
    let h = harness(Arc::new(LogSink));
    let (slow_tx, mut slow_rx) = mpsc::channel(1);
    let (fast_tx, mut fast_rx) = mpsc::channel(8);
    h.fanout.register("slow", slow_tx).unwrap();
    h.fanout.register("fast", fast_tx).unwrap();
    h.fanout.subscribe("slow", "critical-alerts").unwrap();
    h.fanout.subscribe("fast", "critical-alerts").unwrap();

    h.fanout.dispatch(notification("critical-alerts"));
    h.fanout.dispatch(notification("critical-alerts"));

    assert!(slow_rx.try_recv().is_ok());
    assert!(slow_rx.try_recv().is_err());
    assert!(fast_rx.try_recv().is_ok());
    assert!(fast_rx.try_recv().is_ok());
    assert_eq!(h.metrics.get(Counter::SubscriberDropsTotal), 1);
}

#[tokio::test]
async fn test_unknown_subscriber() {
    let h = harness(Arc::new(LogSink));
    let err = h.fanout.subscribe("ghost", "critical-alerts").unwrap_err();
    assert!(matches!(err, MonitorError::UnknownSubscriber(id) if id == "ghost"));

    let (tx, _rx) = mpsc::channel(1);
    h.fanout.register("a", tx).unwrap();
    assert!(!h.fanout.unsubscribe("a", "never-joined").unwrap());
}

#[tokio::test]
async fn test_disconnect_removes_memberships() {
    let h = harness(Arc::new(LogSink));
    let (tx, mut rx) = mpsc::channel(4);
    h.fanout.register("a", tx).unwrap();
    h.fanout.subscribe("a", "critical-alerts").unwrap();
    assert_eq!(h.fanout.subscriptions("a"), Some(vec!["critical-alerts".to_string()]));

    assert!(h.fanout.disconnect("a"));
    assert!(!h.fanout.disconnect("a"));
    assert_eq!(h.fanout.subscriptions("a"), None);
    assert_eq!(h.fanout.subscriber_count(), 0);

    h.fanout.dispatch(notification("critical-alerts"));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_close_disconnects_subscribers() {
    let h = harness(Arc::new(LogSink));
    let (tx, mut rx) = mpsc::channel(4);
    h.fanout.register("a", tx).unwrap();

    h.fanout.close().await;

    assert!(rx.recv().await.is_none());
    let (tx, _rx) = mpsc::channel(4);
    assert!(matches!(h.fanout.register("b", tx), Err(MonitorError::NotRunning)));
}

#[tokio::test]
async fn test_snapshot_reflects_tracker_and_router() {
    let h = harness(Arc::new(LogSink));
    let (tx, _rx) = mpsc::channel(4);
    h.fanout.register("a", tx).unwrap();

    let before = h.fanout.snapshot();
    assert!(!before.ready);
    assert_eq!(before.status_counts.get(&HealthStatus::Unknown), Some(&2));

    h.tracker
        .record(CheckResult::new("api-a", CheckStatus::Healthy))
        .unwrap();
    h.tracker
        .record(CheckResult::new("db", CheckStatus::Unhealthy))
        .unwrap();
    h.stats.send_replace(RouterStats {
        groups: 1,
        firing: 1,
        ..RouterStats::default()
    });

    let after = h.fanout.snapshot();
    assert!(after.ready);
    assert_eq!(after.subscribers, 1);
    assert_eq!(after.alerts.groups, 1);
    let api = after.endpoint("api-a").unwrap();
    assert_eq!(api.status, HealthStatus::Healthy);
    assert_eq!(api.labels.get("service").map(String::as_str), Some("checkout"));
    let db = after.endpoint("db").unwrap();
    assert_eq!(db.consecutive_failures, 1);
    assert_eq!(db.last_check.as_ref().unwrap().status, CheckStatus::Unhealthy);
}

#[test]
fn test_zero_delivery_concurrency_rejected() {
    let registry = Arc::new(EndpointRegistry::default());
    let tracker = Arc::new(StatusTracker::new(&registry, TrackerConfig::default()).unwrap());
    let (_stats, stats_rx) = watch::channel(RouterStats::default());
    let config = FanOutConfig {
        max_concurrent_deliveries: 0,
        ..FanOutConfig::default()
    };

    let result = FanOut::new(
        &config,
        Arc::new(LogSink),
        registry,
        tracker,
        Arc::new(MonitorMetrics::new()),
        stats_rx,
    );
    assert!(matches!(result, Err(MonitorError::Config(_))));
}
