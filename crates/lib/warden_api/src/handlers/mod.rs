//! Request handlers.

pub mod auth;

use std::any::Any;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use warden_core::{Error, ErrorCode};

use crate::error::AppError;

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error_message": "Endpoint not found" })),
    )
}

/// Response for a handler that panicked. The panic payload is logged, never
/// returned.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };

    AppError(
        Error::new(ErrorCode::RequestFailed, format!("handler panicked: {detail}"))
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            .notify(),
    )
    .into_response()
}
