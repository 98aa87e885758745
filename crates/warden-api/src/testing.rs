//! Shared fixtures for API tests.

use std::sync::Arc;

use warden_config::{ApiConfig, ApiTokenConfig, Capability, Config, EndpointConfig};
use warden_monitor::{LogSink, Monitor};

use crate::state::AppState;

pub const OPS_TOKEN: &str = "ops-token";
pub const VIEW_TOKEN: &str = "view-token";

/// Monitor with a single HTTP endpoint `api-a` probing `target`.
pub fn monitor(target: &str) -> Monitor {
    let mut endpoint = EndpointConfig::new("api-a", target).with_label("service", "checkout");
    endpoint.timeout_secs = 2;
    let config = Config {
        endpoints: vec![endpoint],
        ..Config::default()
    };
    match Monitor::new(&config, Arc::new(LogSink)) {
        Ok(monitor) => monitor,
        Err(e) => panic!("test monitor config rejected: {e}"),
    }
}

/// `OPS_TOKEN` may trigger checks and read metrics detail, `VIEW_TOKEN`
/// may do neither.
pub fn api_config() -> ApiConfig {
    ApiConfig {
        tokens: vec![
            ApiTokenConfig {
                token: OPS_TOKEN.to_string(),
                capabilities: vec![Capability::ManualTrigger, Capability::MetricsDetail],
            },
            ApiTokenConfig {
                token: VIEW_TOKEN.to_string(),
                capabilities: vec![],
            },
        ],
    }
}

pub fn state(target: &str) -> Arc<AppState> {
    Arc::new(AppState::new(Arc::new(monitor(target)), &api_config()))
}
