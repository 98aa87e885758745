//! # Warden Monitor
//!
//! Endpoint health monitoring with Alertmanager-style alert routing.
//!
//! ## Features
//!
//! - Scheduled HTTP and TCP probes on a bounded worker pool
//! - Per-endpoint health state with failure and recovery thresholds
//! - Routing tree, grouping, group timing and inhibition for alerts
//! - Receiver sinks and live subscriber fan-out
//! - Prometheus format metrics and JSON snapshots

pub mod capability;
pub mod error;
pub mod executor;
pub mod fanout;
pub mod gateway;
pub mod metrics;
pub mod monitor;
pub mod probe;
pub mod registry;
pub mod router;
pub mod sink;
pub mod snapshot;
pub mod tracker;
pub mod types;

#[cfg(test)]
mod testing;

pub use capability::CapabilitySet;
pub use error::{MonitorError, ProbeError};
pub use executor::CheckExecutor;
pub use fanout::FanOut;
pub use gateway::{Ack, ErrorPayload, GatewaySession};
pub use metrics::{Counter, MonitorMetrics};
pub use monitor::{CoreHealth, Monitor};
pub use probe::{HttpProbe, Probe, ProbeSet, TcpProbe};
pub use registry::EndpointRegistry;
pub use router::{AlertRouter, Notification};
pub use sink::{AlertSink, LogSink};
pub use snapshot::{EndpointSnapshot, MonitorSnapshot, RouterStats};
pub use tracker::{EndpointState, StatusTracker};
pub use types::{
    AlertEvent, AlertState, CheckResult, CheckStatus, Endpoint, HealthStatus, Labels, Trigger,
    UnknownReason,
};
