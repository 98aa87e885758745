//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use warden_monitor::{ErrorPayload, MonitorError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// A token was presented but is not configured.
    #[error("Invalid API token")]
    Unauthorized,

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Monitor(err) => match err {
                MonitorError::Forbidden { .. } => StatusCode::FORBIDDEN,
                MonitorError::UnknownEndpoint(_) | MonitorError::UnknownSubscriber(_) => {
                    StatusCode::NOT_FOUND
                }
                MonitorError::CheckInFlight(_) | MonitorError::AlreadyRunning => {
                    StatusCode::CONFLICT
                }
                MonitorError::NotRunning => StatusCode::SERVICE_UNAVAILABLE,
                MonitorError::Delivery { .. } => StatusCode::BAD_GATEWAY,
                MonitorError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Bind { .. } | ApiError::Serve(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body shared with the WebSocket `error` reply.
    pub fn payload(&self) -> ErrorPayload {
        match self {
            ApiError::Monitor(err) => ErrorPayload::from(err),
            ApiError::Unauthorized => ErrorPayload::new(self.to_string()).with_detail("unauthorized"),
            ApiError::Bind { .. } | ApiError::Serve(_) => {
                ErrorPayload::new(self.to_string()).with_detail("server_error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.payload())).into_response()
    }
}
