//! HTTP mapping of device errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use klvr_core::DeviceError;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Errors returned by request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Device(e) => match e {
                DeviceError::OutOfRange { .. } => StatusCode::NOT_FOUND,
                DeviceError::InvalidArgument(_) | DeviceError::MalformedRequest(_) => {
                    StatusCode::BAD_REQUEST
                }
                DeviceError::AlreadyRebooting(_) => StatusCode::CONFLICT,
                DeviceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Device(e) => e.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        debug!("Request failed with {}: {}", status, self);
        let body = json!({
            "error": self.kind(),
            "detail": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Shorthand constructor for malformed input
pub fn malformed(detail: impl Into<String>) -> ApiError {
    ApiError::Device(DeviceError::MalformedRequest(detail.into()))
}

/// Shorthand constructor for invalid arguments
pub fn invalid(detail: impl Into<String>) -> ApiError {
    ApiError::Device(DeviceError::InvalidArgument(detail.into()))
}
