//! HTTP route definitions.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::http::{checks, monitoring};
use crate::state::AppState;
use crate::websocket::ws_handler;

/// Create the main router.
///
/// ## Route Structure
///
/// ```text
/// /health          - Aggregate endpoint health (always 200)
/// /metrics         - Prometheus metrics
/// /snapshot        - JSON snapshot of endpoints and alerts
/// /livez           - Liveness probe
/// /readyz          - Readiness probe (503 until every endpoint reported)
///
/// POST /checks/{name} - On-demand check (manual_trigger)
///
/// /ws              - Real-time gateway (token via ?token=)
/// ```
pub fn create_router(state: Arc<AppState>) -> Router {
    let monitoring_routes = Router::new()
        .route("/health", get(monitoring::health_check))
        .route("/metrics", get(monitoring::prometheus_metrics))
        .route("/snapshot", get(monitoring::snapshot))
        .route("/readyz", get(monitoring::readiness_probe))
        .with_state(state.clone());

    // Liveness probe has no state dependency
    let liveness_route = Router::new().route("/livez", get(monitoring::liveness_probe));

    let check_routes = Router::new()
        .route("/{name}", post(checks::trigger_check))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state);

    Router::new()
        .nest("/checks", check_routes)
        .merge(monitoring_routes)
        .merge(liveness_route)
        .merge(ws_route)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
