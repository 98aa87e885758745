use super::*;
use crate::testing::monitor;
use warden_config::Capability;
use warden_monitor::{CheckStatus, HealthStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn healthy_target() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn open(monitor: &Arc<warden_monitor::Monitor>, capabilities: CapabilitySet) -> GatewaySession {
    GatewaySession::open(Arc::clone(monitor), "ws-test", capabilities)
        .unwrap()
        .0
}

#[tokio::test]
async fn test_subscribe_and_unsubscribe_ack() {
    let monitor = Arc::new(monitor("http://127.0.0.1:1/health"));
    let session = open(&monitor, CapabilitySet::none());

    let group = "critical-alerts".to_string();
    match respond(&session, ClientMessage::Subscribe { group: group.clone() }).await {
        ServerMessage::Ack(ack) => {
            assert_eq!(ack.action, "subscribe");
            assert!(ack.changed);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    match respond(&session, ClientMessage::Subscribe { group: group.clone() }).await {
        ServerMessage::Ack(ack) => assert!(!ack.changed),
        other => panic!("unexpected reply: {other:?}"),
    }
    match respond(&session, ClientMessage::Unsubscribe { group }).await {
        ServerMessage::Ack(ack) => {
            assert_eq!(ack.action, "unsubscribe");
            assert!(ack.changed);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn test_snapshot_and_ping() {
    let monitor = Arc::new(monitor("http://127.0.0.1:1/health"));
    let session = open(&monitor, CapabilitySet::none());

    match respond(&session, ClientMessage::GetSnapshot).await {
        ServerMessage::Snapshot(snapshot) => {
            assert_eq!(snapshot.endpoints.len(), 1);
            assert_eq!(snapshot.subscribers, 1);
            assert_eq!(snapshot.endpoint("api-a").unwrap().status, HealthStatus::Unknown);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    assert!(matches!(
        respond(&session, ClientMessage::Ping { timestamp: 7 }).await,
        ServerMessage::Pong { timestamp: 7 }
    ));
}

#[tokio::test]
async fn test_trigger_check_requires_capability() {
    let monitor = Arc::new(monitor("http://127.0.0.1:1/health"));
    let session = open(&monitor, CapabilitySet::none());

    let reply = respond(
        &session,
        ClientMessage::TriggerCheck {
            endpoint: "api-a".to_string(),
        },
    )
    .await;
    match reply {
        ServerMessage::Error(payload) => {
            assert_eq!(payload.detail.as_deref(), Some("forbidden"));
            assert!(payload.message.contains("manual_trigger"));
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn test_trigger_check_runs_probe() {
    let server = healthy_target().await;
    let monitor = Arc::new(monitor(&format!("{}/health", server.uri())));
    let session = open(&monitor, CapabilitySet::none().with(Capability::ManualTrigger));

    let reply = respond(
        &session,
        ClientMessage::TriggerCheck {
            endpoint: "api-a".to_string(),
        },
    )
    .await;
    match reply {
        ServerMessage::CheckResult(result) => {
            assert_eq!(result.check_name, "api-a");
            assert_eq!(result.status, CheckStatus::Healthy);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    assert!(monitor.is_ready());
}

#[tokio::test]
async fn test_trigger_unknown_endpoint() {
    let monitor = Arc::new(monitor("http://127.0.0.1:1/health"));
    let session = open(&monitor, CapabilitySet::all());

    let reply = respond(
        &session,
        ClientMessage::TriggerCheck {
            endpoint: "nope".to_string(),
        },
    )
    .await;
    match reply {
        ServerMessage::Error(payload) => assert_eq!(payload.detail.as_deref(), Some("unknown_endpoint")),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn test_metrics_gated_by_capability() {
    let monitor = Arc::new(monitor("http://127.0.0.1:1/health"));

    let plain = open(&monitor, CapabilitySet::none());
    assert!(matches!(
        respond(&plain, ClientMessage::GetMetrics).await,
        ServerMessage::Error(_)
    ));
    drop(plain);

    let detailed = open(&monitor, CapabilitySet::none().with(Capability::MetricsDetail));
    match respond(&detailed, ClientMessage::GetMetrics).await {
        ServerMessage::Metrics { content } => assert!(content.contains("warden_checks_total")),
        other => panic!("unexpected reply: {other:?}"),
    }
}
