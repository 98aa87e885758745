//! On-demand checks.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use tokio_util::sync::CancellationToken;
use tracing::info;
use warden_config::Capability;
use warden_monitor::CheckResult;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /checks/{name}
///
/// Requires `manual_trigger`. The probe is cancelled if the client goes
/// away before it finishes.
pub async fn trigger_check(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Caller(capabilities): Caller,
) -> Result<Json<CheckResult>, ApiError> {
    capabilities.require(Capability::ManualTrigger)?;
    info!("Manual check requested over HTTP: {}", name);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let result = state.monitor.perform_check(&name, &cancel).await?;
    Ok(Json(result))
}
