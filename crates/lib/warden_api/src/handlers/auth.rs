//! Session request handlers.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue},
};
use warden_core::models::auth::CallerContext;
use warden_core::{Error, ErrorCode};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::caller_claims;
use crate::models::{LoginRequest, SessionResponse, SuccessResponse};
use crate::services::auth;

/// `POST /v1/auth`: log in with username + password. The session token is
/// returned in the token header.
pub async fn login_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<(HeaderMap, Json<SuccessResponse>)> {
    let Json(body) = body.map_err(|e| {
        AppError(Error::with_source(
            ErrorCode::InvalidForm,
            e,
            "Failed to decode login request",
        ))
    })?;

    let token = auth::login(&state.authenticator, &body.username, &body.password, &caller).await?;

    let value = HeaderValue::from_str(&token).map_err(|e| {
        AppError(Error::with_source(
            ErrorCode::RequestFailed,
            e,
            "session token is not a valid header value",
        ))
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(state.authenticator.token_header().clone(), value);

    Ok((headers, Json(SuccessResponse::ok())))
}

/// `DELETE /v1/auth`: deactivate the caller's session. Idempotent.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
) -> AppResult<Json<SuccessResponse>> {
    let claims = caller_claims(&caller)?;
    auth::logout(&state.authenticator, claims).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// `GET /v1/auth`: the caller's session as carried by its token.
pub async fn current_session_handler(
    Extension(caller): Extension<CallerContext>,
) -> AppResult<Json<SessionResponse>> {
    let claims = caller_claims(&caller)?;
    Ok(Json(SessionResponse::from(claims)))
}
