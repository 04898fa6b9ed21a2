use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::api::types::ErrorResponse;
use crate::core::errors::WalletError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// HTTP error with the `{ error, code }` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self { status, body: ErrorResponse { error: message.into(), code: code.to_string() } }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        let (status, code) = match &err {
            WalletError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            WalletError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            WalletError::InsufficientFunds(_) => (StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS"),
            WalletError::SafeNotConfigured => (StatusCode::BAD_REQUEST, "SAFE_NOT_CONFIGURED"),
            WalletError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            WalletError::NotFoundError(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            WalletError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            _ => {
                error!(error = %err, "request failed");
                return Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", INTERNAL_MESSAGE);
            }
        };
        Self::new(status, code, err.message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
