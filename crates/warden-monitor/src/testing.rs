//! Shared fixtures for monitor-level tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use warden_config::{
    AlertingConfig, Config, EndpointConfig, EndpointKind, InhibitRuleConfig, ReceiverConfig,
    RouteConfig,
};

use crate::error::{MonitorError, ProbeError};
use crate::probe::{Probe, ProbeSet};
use crate::router::Notification;
use crate::sink::AlertSink;
use crate::types::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Healthy,
    Failing,
    Hanging,
}

/// Probe whose outcome is switched by the test.
pub struct SwitchProbe {
    mode: Mutex<Mode>,
}

impl SwitchProbe {
    pub fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
        })
    }

    pub fn set(&self, mode: Mode) {
        *self.mode.lock() = mode;
    }
}

#[async_trait]
impl Probe for SwitchProbe {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Http
    }

    async fn probe(&self, _endpoint: &Endpoint) -> Result<String, ProbeError> {
        let mode = *self.mode.lock();
        match mode {
            Mode::Healthy => Ok("HTTP 200".to_string()),
            Mode::Failing => Err(ProbeError::Status(503)),
            Mode::Hanging => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("late".to_string())
            }
        }
    }
}

/// Sink that keeps every delivery.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, _receiver: &str, notification: &Notification) -> Result<(), MonitorError> {
        self.delivered.lock().push(notification.clone());
        Ok(())
    }
}

/// One HTTP endpoint `api-a` checked every 10s with a 5s timeout, and the
/// critical/warning routing tree.
pub fn config() -> Config {
    let mut endpoint = EndpointConfig::new("api-a", "http://api-a.internal/health")
        .with_label("service", "checkout");
    endpoint.interval_secs = 10;
    endpoint.timeout_secs = 5;

    let mut critical = RouteConfig::to_receiver("critical-alerts").with_match("severity", "critical");
    critical.group_by = Some(vec!["alertname".to_string(), "service".to_string()]);
    let warning = RouteConfig::to_receiver("warning-alerts").with_match("severity", "warning");

    Config {
        endpoints: vec![endpoint],
        alerting: AlertingConfig {
            group_wait_secs: 30,
            group_interval_secs: 300,
            repeat_interval_secs: 14_400,
            receivers: ["default", "critical-alerts", "warning-alerts"]
                .into_iter()
                .map(ReceiverConfig::new)
                .collect(),
            route: RouteConfig::to_receiver("default")
                .with_route(critical)
                .with_route(warning),
            inhibit_rules: vec![InhibitRuleConfig {
                source_match: BTreeMap::from([("severity".to_string(), "critical".to_string())]),
                target_match: BTreeMap::from([("severity".to_string(), "warning".to_string())]),
                equal: vec!["service".to_string()],
                ..InhibitRuleConfig::default()
            }],
        },
        ..Config::default()
    }
}

pub fn probes(probe: &Arc<SwitchProbe>) -> ProbeSet {
    ProbeSet::new().with_probe(Arc::clone(probe) as Arc<dyn Probe>)
}
