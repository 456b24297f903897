//! Per-request caller context: request id, origin address, user agent and
//! decoded token claims.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::{HOST, USER_AGENT}},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;
use warden_core::auth::TokenError;
use warden_core::models::auth::CallerContext;
use warden_core::{Error, ErrorCode};

use crate::AppState;
use crate::error::AppError;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Origin address: first `X-Forwarded-For` entry when the header is trusted,
/// else the peer address.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .filter(|_| trust_forwarded_for)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => peer.map(|addr| addr.ip().to_string()),
    }
}

fn timeout_error(timeout: Duration) -> AppError {
    AppError(
        Error::new(
            ErrorCode::RequestFailed,
            format!("request exceeded {timeout:?}"),
        )
        .with_status(StatusCode::REQUEST_TIMEOUT),
    )
}

/// Axum middleware: builds the [`CallerContext`] for the request, stamps a
/// request id on the response and bounds the request by the configured
/// timeout.
pub async fn setup_caller_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip_address = client_ip(request.headers(), peer, state.config.trust_forwarded_for);
    if ip_address.is_none() {
        warn!(request_id = %request_id, "unable to determine caller address");
    }

    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let token = match state.authenticator.extract_token_info(request.headers()) {
        Ok(claims) => Some(claims),
        Err(TokenError::NotProvided) => None,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Failed to parse token info from request");
            None
        }
    };

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let host = request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    info!(
        parent: &span,
        host,
        uri = %request.uri(),
        ip = ?ip_address,
        user_agent = %user_agent,
        authenticated = token.is_some(),
        "request received"
    );

    request.extensions_mut().insert(CallerContext {
        request_id: request_id.clone(),
        ip_address,
        user_agent,
        token,
    });

    let timeout = state.config.request_timeout;
    let mut response = match tokio::time::timeout(timeout, next.run(request))
        .instrument(span)
        .await
    {
        Ok(response) => response,
        Err(_) => timeout_error(timeout).into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
