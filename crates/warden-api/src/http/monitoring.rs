//! Health, readiness and metrics handlers.
//!
//! These read the monitor's state at request time and never fail: a
//! troubled core shows up in the body, not as a crashed handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use warden_config::Capability;
use warden_monitor::{HealthStatus, MonitorSnapshot};

use crate::auth::Caller;
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status across endpoints.
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub ready: bool,
    pub running: bool,
    pub checks_in_flight: usize,
    pub components: Vec<ComponentHealth>,
}

/// Health of one monitored endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Prometheus metrics response (text format).
#[derive(Debug)]
pub struct PrometheusMetrics {
    pub content: String,
}

impl IntoResponse for PrometheusMetrics {
    fn into_response(self) -> Response {
        ([(CONTENT_TYPE, "text/plain; version=0.0.4")], self.content).into_response()
    }
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let core = state.monitor.core_health();
    let components = state
        .monitor
        .snapshot()
        .endpoints
        .into_iter()
        .map(|e| ComponentHealth {
            name: e.name,
            status: e.status,
            message: e.last_check.and_then(|c| c.detail),
        })
        .collect();

    Json(HealthResponse {
        status: core.status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime().as_secs(),
        ready: core.ready,
        running: core.running,
        checks_in_flight: core.checks_in_flight,
        components,
    })
}

/// GET /metrics. Per-endpoint series need `metrics_detail`.
pub async fn prometheus_metrics(
    State(state): State<Arc<AppState>>,
    Caller(capabilities): Caller,
) -> PrometheusMetrics {
    let detail = capabilities.has(Capability::MetricsDetail);
    let mut content = state.monitor.render_metrics(detail);
    content.push_str(&format!(
        "# HELP warden_uptime_seconds Seconds since the API started\n\
         # TYPE warden_uptime_seconds gauge\n\
         warden_uptime_seconds {}\n",
        state.uptime().as_secs()
    ));
    PrometheusMetrics { content }
}

/// GET /snapshot
pub async fn snapshot(State(state): State<Arc<AppState>>) -> Json<MonitorSnapshot> {
    Json(state.monitor.snapshot())
}

/// GET /livez
pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive"
    }))
}

/// GET /readyz. 503 until every endpoint has reported at least once.
pub async fn readiness_probe(State(state): State<Arc<AppState>>) -> Response {
    if state.monitor.is_ready() {
        Json(serde_json::json!({ "status": "ready" })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not_ready" })),
        )
            .into_response()
    }
}

#[cfg(test)]
#[path = "monitoring_tests.rs"]
mod tests;
