//! WebSocket message types.

use serde::{Deserialize, Serialize};
use warden_monitor::{Ack, CheckResult, ErrorPayload, MonitorSnapshot, Notification};

/// Messages sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { group: String },
    Unsubscribe { group: String },
    GetSnapshot,
    TriggerCheck { endpoint: String },
    GetMetrics,
    Ping { timestamp: i64 },
}

/// Messages sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection.
    Connected { connection_id: String },
    Ack(Ack),
    Snapshot(MonitorSnapshot),
    CheckResult(CheckResult),
    Metrics { content: String },
    /// A flushed notification for a subscribed group.
    Alert(Notification),
    Error(ErrorPayload),
    Pong { timestamp: i64 },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Error(ErrorPayload::new(message).with_detail(detail))
    }
}
