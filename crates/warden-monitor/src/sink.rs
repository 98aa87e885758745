//! Receiver sinks.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::MonitorError;
use crate::router::Notification;
use crate::types::AlertState;

/// Delivers group notifications to a named receiver.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Sink name, for logs.
    fn name(&self) -> &str;

    async fn deliver(&self, receiver: &str, notification: &Notification) -> Result<(), MonitorError>;
}

/// Writes every notification to the log.
pub struct LogSink;

impl LogSink {
    fn summary(notification: &Notification) -> String {
        let firing: Vec<&str> = notification
            .firing
            .iter()
            .map(|a| a.fingerprint.as_str())
            .collect();
        let resolved: Vec<&str> = notification
            .resolved
            .iter()
            .map(|a| a.fingerprint.as_str())
            .collect();
        format!(
            "group {} firing [{}] resolved [{}]",
            notification.group_key,
            firing.join(", "),
            resolved.join(", ")
        )
    }
}

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, receiver: &str, notification: &Notification) -> Result<(), MonitorError> {
        let summary = Self::summary(notification);
        let critical = notification
            .firing
            .iter()
            .any(|a| a.severity() == Some("critical"));

        match notification.status() {
            AlertState::Resolved => info!("[ALERT:{}] RESOLVED {}", receiver, summary),
            AlertState::Firing if critical => error!("[ALERT:{}] FIRING {}", receiver, summary),
            AlertState::Firing => warn!("[ALERT:{}] FIRING {}", receiver, summary),
        }
        Ok(())
    }
}
