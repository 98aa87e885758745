//! API server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use warden_config::ServerConfig;

use crate::error::ApiError;
use crate::http::routes::create_router;
use crate::state::AppState;

/// A bound API server, ready to serve.
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
}

impl ApiServer {
    /// Bind the configured address. Port 0 picks a free port.
    pub async fn bind(config: &ServerConfig, state: Arc<AppState>) -> Result<Self, ApiError> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ApiError::Bind { addr, source })?;
        Ok(Self {
            listener,
            router: create_router(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ApiError> {
        self.listener.local_addr().map_err(ApiError::Serve)
    }

    /// Serve until `shutdown` is cancelled, then let open requests finish.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), ApiError> {
        if let Ok(addr) = self.listener.local_addr() {
            info!("API server listening on {}", addr);
        }
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(ApiError::Serve)?;
        info!("API server stopped");
        Ok(())
    }
}
