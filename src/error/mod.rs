use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid payment: {0}")]
    InvalidPayment(String),

    #[error("Invalid summary range: {0}")]
    InvalidRange(String),

    #[error("Processor {processor} responded with status {status}")]
    UpstreamStatus { processor: String, status: u16 },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Call cancelled: {0}")]
    Cancelled(String),

    #[error("Health check failed: {0}")]
    HealthCheck(String),

    #[error("Invalid payment transition: {0}")]
    InvalidTransition(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::InvalidPayment(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidRange(_) => StatusCode::BAD_REQUEST,
            GatewayError::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Backend(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::HealthCheck(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::InvalidTransition(_) => StatusCode::CONFLICT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error came from talking to an upstream processor
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::UpstreamStatus { .. }
                | GatewayError::Backend(_)
                | GatewayError::Timeout(_)
                | GatewayError::Cancelled(_)
        )
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
