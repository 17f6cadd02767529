//! Response helpers shared by all handlers.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use catchment_engine::EngineError;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Error body: `{"error": "<message>"}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

/// Build a JSON error response.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let body = serde_json::to_vec(&ErrorBody { error: message }).unwrap_or_default();
    json_bytes(status, Bytes::from(body))
}

/// A pre-serialized JSON body.
pub fn json_bytes(status: StatusCode, body: Bytes) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Serialize `value` as a JSON response.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => json_bytes(status, Bytes::from(body)),
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to serialize response")
        }
    }
}

/// Errors a handler can return.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    /// Malformed request that never reached the engine.
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => StatusCode::from_u16(e.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {}", e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Engine(e) => {
                if e.is_not_found() {
                    debug!(kind = e.kind(), "{}", e);
                } else if status.is_server_error() {
                    error!(kind = e.kind(), "{}", e);
                } else {
                    warn!(kind = e.kind(), "{}", e);
                }
                e.to_string()
            }
            ApiError::BadRequest(msg) => {
                warn!("Bad request: {}", msg);
                msg.clone()
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                msg.clone()
            }
        };
        error_response(status, &message)
    }
}
