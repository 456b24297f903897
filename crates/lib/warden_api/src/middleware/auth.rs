//! Access policy middleware: geofence exemption, live session validation and
//! token refresh.

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use warden_core::models::auth::{CallerContext, TokenClaims};
use warden_core::ErrorCode;

use crate::AppState;
use crate::error::AppError;

/// Axum middleware guarding protected routes.
///
/// Exempt (route, country) pairs pass through without a token. Everyone else
/// needs a token whose session and user are still live; a refreshed token is
/// attached to the response when the old one is due.
pub async fn require_active_user(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = request
        .extensions()
        .get::<CallerContext>()
        .cloned()
        .unwrap_or_default();

    if state
        .geofence
        .allows_anonymous(
            request.method(),
            request.uri().path(),
            caller.ip_address.as_deref(),
        )
        .await
    {
        debug!(path = request.uri().path(), "geofence exemption granted");
        return Ok(next.run(request).await);
    }

    let claims = caller.claims().ok_or_else(|| {
        AppError::new(ErrorCode::InvalidCredentials, "Token not provided or invalid")
    })?;

    state
        .authenticator
        .validate_session(claims)
        .await
        .map_err(|e| AppError(e.context("Failed to validate current session").notify()))?;

    let refreshed = state.authenticator.refresh_if_due(claims).await?;

    let mut response = next.run(request).await;

    if let Some(token) = refreshed {
        match HeaderValue::from_str(&token) {
            Ok(value) => {
                response
                    .headers_mut()
                    .insert(state.authenticator.token_header().clone(), value);
            }
            Err(e) => warn!(error = %e, "refreshed token is not a valid header value"),
        }
    }
    Ok(response)
}

/// Current caller claims, for handlers behind [`require_active_user`].
pub(crate) fn caller_claims(caller: &CallerContext) -> Result<&TokenClaims, AppError> {
    caller
        .claims()
        .ok_or_else(|| AppError::new(ErrorCode::InvalidCredentials, "no token in context"))
}
