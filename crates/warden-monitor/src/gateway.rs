//! Transport-agnostic real-time operations.
//!
//! A [`GatewaySession`] is one live connection: it owns a fan-out
//! registration, the caller's capabilities and a cancellation token that
//! aborts its manual checks when the connection goes away.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use warden_config::Capability;

use crate::capability::CapabilitySet;
use crate::error::MonitorError;
use crate::monitor::Monitor;
use crate::router::Notification;
use crate::snapshot::MonitorSnapshot;
use crate::types::CheckResult;

/// Acknowledges a membership change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub action: String,
    pub group: String,
    /// False when the call was a no-op.
    pub changed: bool,
}

/// Error reply shared by every transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<&MonitorError> for ErrorPayload {
    fn from(err: &MonitorError) -> Self {
        ErrorPayload::new(err.to_string()).with_detail(err.code())
    }
}

pub struct GatewaySession {
    id: String,
    monitor: Arc<Monitor>,
    capabilities: CapabilitySet,
    cancel: CancellationToken,
}

impl GatewaySession {
    /// Register a connection. Notifications for subscribed groups arrive
    /// on the receiver.
    pub fn open(
        monitor: Arc<Monitor>,
        id: impl Into<String>,
        capabilities: CapabilitySet,
    ) -> Result<(Self, mpsc::Receiver<Notification>), MonitorError> {
        let id = id.into();
        let (tx, rx) = mpsc::channel(monitor.subscriber_buffer().max(1));
        monitor.fanout().register(id.clone(), tx)?;
        debug!("Gateway session {} opened", id);

        let session = Self {
            id,
            monitor,
            capabilities,
            cancel: CancellationToken::new(),
        };
        Ok((session, rx))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn subscribe(&self, group: &str) -> Result<Ack, MonitorError> {
        let changed = self.monitor.fanout().subscribe(&self.id, group)?;
        Ok(Ack {
            action: "subscribe".to_string(),
            group: group.to_string(),
            changed,
        })
    }

    pub fn unsubscribe(&self, group: &str) -> Result<Ack, MonitorError> {
        let changed = self.monitor.fanout().unsubscribe(&self.id, group)?;
        Ok(Ack {
            action: "unsubscribe".to_string(),
            group: group.to_string(),
            changed,
        })
    }

    pub fn get_snapshot(&self) -> MonitorSnapshot {
        self.monitor.snapshot()
    }

    /// Requires [`Capability::ManualTrigger`]. Cancelled if the session closes.
    pub async fn trigger_manual_check(&self, endpoint: &str) -> Result<CheckResult, MonitorError> {
        self.capabilities.require(Capability::ManualTrigger)?;
        self.monitor.perform_check(endpoint, &self.cancel).await
    }

    /// Requires [`Capability::MetricsDetail`].
    pub fn get_metrics(&self) -> Result<String, MonitorError> {
        self.capabilities.require(Capability::MetricsDetail)?;
        Ok(self.monitor.render_metrics(true))
    }

    /// Cancel outstanding checks and drop every membership.
    pub fn close(&self) {
        self.cancel.cancel();
        if self.monitor.fanout().disconnect(&self.id) {
            debug!("Gateway session {} closed", self.id);
        }
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        self.close();
    }
}
