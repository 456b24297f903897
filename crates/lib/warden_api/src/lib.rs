//! # warden_api
//!
//! HTTP surface for Warden: caller context, access policy middleware and the
//! session routes.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::http::header::{
    CACHE_CONTROL, CONTENT_TYPE, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use axum::http::{HeaderName, HeaderValue};
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use warden_core::auth::{SessionAuthenticator, TokenCodec};
use warden_core::geofence::{CountryLookup, GeofenceResolver};
use warden_core::store::SessionStore;

use crate::config::{ApiConfig, ConfigError};
use crate::handlers::auth;
use crate::middleware::context::REQUEST_ID_HEADER;

/// Session routes.
pub const AUTH_ROUTE: &str = "/v1/auth";

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    pub authenticator: Arc<SessionAuthenticator>,
    pub geofence: Arc<GeofenceResolver>,
}

impl AppState {
    /// Wire the authenticator and geofence resolver from configuration.
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn SessionStore>,
        lookup: Arc<dyn CountryLookup>,
    ) -> Result<Self, ConfigError> {
        let codec =
            TokenCodec::new(config.jwt_signing_key.as_bytes()).map_err(|_| ConfigError::MissingSigningKey)?;
        let authenticator = SessionAuthenticator::new(codec, store, config.token_header.clone());
        let geofence = GeofenceResolver::new(lookup, config.geofence.clone());
        Ok(Self {
            config,
            authenticator: Arc::new(authenticator),
            geofence: Arc::new(geofence),
        })
    }
}

/// Builds the Axum router with the session routes only.
pub fn router(state: AppState) -> Router {
    router_with(state, Router::new())
}

/// Builds the Axum router, placing `protected_routes` behind the access
/// policy alongside the session routes.
pub fn router_with(state: AppState, protected_routes: Router<AppState>) -> Router {
    let token_header: HeaderName = state.config.token_header.clone();
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([CONTENT_TYPE, token_header.clone()])
        .expose_headers([token_header, REQUEST_ID_HEADER]);

    let public = Router::new().route(AUTH_ROUTE, post(auth::login_handler));

    let protected = Router::new()
        .route(
            AUTH_ROUTE,
            get(auth::current_session_handler).delete(auth::logout_handler),
        )
        .merge(protected_routes)
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_active_user,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::custom(handlers::panic_response))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::context::setup_caller_context,
        ))
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=315360000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .with_state(state)
}
