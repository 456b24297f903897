//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};
use warden_core::auth::TokenError;
use warden_core::ErrorCode;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Error wrapper carrying a core [`warden_core::Error`] to the HTTP layer.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct AppError(#[from] pub warden_core::Error);

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self(warden_core::Error::new(code, message))
    }

    pub fn code(&self) -> ErrorCode {
        self.0.code()
    }

    pub fn status(&self) -> StatusCode {
        self.0.http_status()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let chain = self.0.to_string();

        if self.0.should_notify() || status.is_server_error() {
            error!(error_code = code.as_str(), status = status.as_u16(), error = %chain, "request failed");
        } else {
            warn!(error_code = code.as_str(), status = status.as_u16(), error = %chain, "request rejected");
        }

        let body = Json(ErrorResponse {
            error_code: code.as_str().to_string(),
            error_message: code.message().to_string(),
        });
        (status, body).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        Self(e.into())
    }
}
