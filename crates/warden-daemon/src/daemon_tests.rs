use super::*;
use warden_config::{EndpointConfig, ServerConfig};
use warden_monitor::{LogSink, MonitorError};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn target() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn config(target: &MockServer) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        endpoints: vec![EndpointConfig::new("api-a", format!("{}/health", target.uri()))],
        ..Config::default()
    }
}

async fn wait_until_running(daemon: &Daemon) {
    for _ in 0..200 {
        if daemon.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("daemon did not reach running state");
}

#[tokio::test]
async fn test_serve_until_shutdown_signal() {
    let server = target().await;
    let daemon = Arc::new(Daemon::new(config(&server), Arc::new(LogSink)).unwrap());
    assert_eq!(daemon.state(), DaemonState::Stopped);

    let task = tokio::spawn({
        let daemon = Arc::clone(&daemon);
        async move { daemon.serve().await }
    });
    wait_until_running(&daemon).await;
    assert!(daemon.monitor().is_running());

    daemon.signal_handler().request_shutdown();
    assert!(task.await.unwrap().is_ok());
    assert_eq!(daemon.state(), DaemonState::Stopped);
    assert!(!daemon.monitor().is_running());
}

#[tokio::test]
async fn test_serve_while_running_is_rejected() {
    let server = target().await;
    let daemon = Arc::new(Daemon::new(config(&server), Arc::new(LogSink)).unwrap());
    let task = tokio::spawn({
        let daemon = Arc::clone(&daemon);
        async move { daemon.serve().await }
    });
    wait_until_running(&daemon).await;

    match daemon.serve().await {
        Err(DaemonError::InvalidStateTransition { from, to }) => {
            assert_eq!(from, DaemonState::Running);
            assert_eq!(to, DaemonState::Starting);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    daemon.signal_handler().request_terminate();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_signal_before_serve_stops_immediately() {
    let server = target().await;
    let daemon = Daemon::new(config(&server), Arc::new(LogSink)).unwrap();
    daemon.signal_handler().request_terminate();

    assert!(daemon.serve().await.is_ok());
    assert_eq!(daemon.state(), DaemonState::Stopped);
}

#[tokio::test]
async fn test_bind_failure_leaves_monitor_stopped() {
    let server = target().await;
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = config(&server);
    config.server.port = taken.local_addr().unwrap().port();

    let daemon = Daemon::new(config, Arc::new(LogSink)).unwrap();
    let err = daemon.serve().await.unwrap_err();
    assert!(matches!(err, DaemonError::Api(_)));
    assert_eq!(daemon.state(), DaemonState::Stopped);
    assert!(!daemon.monitor().is_running());
}

#[test]
fn test_invalid_routing_is_rejected() {
    let mut config = Config::default();
    config.alerting.route.receiver = Some("missing".to_string());

    let err = match Daemon::new(config, Arc::new(LogSink)) {
        Err(e) => e,
        Ok(_) => panic!("daemon accepted an unknown receiver"),
    };
    assert!(matches!(err, DaemonError::Monitor(MonitorError::Config(_))));
}
