//! API server configuration.

use std::fmt;
use std::time::Duration;

use axum::http::HeaderName;
use thiserror::Error;
use warden_core::auth::DEFAULT_TOKEN_HEADER;
use warden_core::geofence::{
    DEFAULT_EXEMPT_COUNTRY, DEFAULT_EXEMPT_ROUTES, DEFAULT_IP_LOOKUP_URL, GeoError,
    GeofencePolicy,
};

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SIGNING_KEY must be set to a non-empty value")]
    MissingSigningKey,

    #[error("invalid token header name {0:?}")]
    InvalidTokenHeader(String),

    #[error("invalid REQUEST_TIMEOUT_SECS {0:?}")]
    InvalidTimeout(String),

    #[error("invalid TRUST_FORWARDED_FOR {0:?}")]
    InvalidTrustForwardedFor(String),

    #[error("invalid geofence configuration: {0}")]
    Geofence(#[from] GeoError),
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3000").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Token signing secret.
    pub jwt_signing_key: String,
    /// Header carrying the session token in both directions.
    pub token_header: HeaderName,
    /// Base URL of the IP-to-country lookup service.
    pub ip_lookup_url: String,
    /// Take the caller address from `X-Forwarded-For` rather than the peer.
    /// Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    /// Upper bound on a single request, store and lookup calls included.
    pub request_timeout: Duration,
    /// Geofence exemption table.
    pub geofence: GeofencePolicy,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("token_header", &self.token_header)
            .field("ip_lookup_url", &self.ip_lookup_url)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .field("request_timeout", &self.request_timeout)
            .field("geofence", &self.geofence)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                  | Default                                          |
    /// |---------------------------|--------------------------------------------------|
    /// | `BIND_ADDR`               | `127.0.0.1:3000`                                 |
    /// | `DATABASE_URL`            | `postgres://localhost:5432/warden`               |
    /// | `JWT_SIGNING_KEY`         | required                                         |
    /// | `TOKEN_HEADER`            | `x-warden-token`                                 |
    /// | `IP_LOOKUP_URL`           | `https://ipapi.co/`                              |
    /// | `TRUST_FORWARDED_FOR`     | `true`                                           |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                                             |
    /// | `GEOFENCE_EXEMPT_COUNTRY` | `Cyprus`                                         |
    /// | `GEOFENCE_EXEMPT_ROUTES`  | `POST /v1/companies,DELETE /v1/companies/{id}`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_signing_key = var("JWT_SIGNING_KEY").ok_or(ConfigError::MissingSigningKey)?;

        let token_header = var("TOKEN_HEADER").unwrap_or_else(|| DEFAULT_TOKEN_HEADER.into());
        let token_header = HeaderName::from_bytes(token_header.trim().as_bytes())
            .map_err(|_| ConfigError::InvalidTokenHeader(token_header.clone()))?;

        let request_timeout = match var("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidTimeout(raw))?,
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let trust_forwarded_for = match var("TRUST_FORWARDED_FOR") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => return Err(ConfigError::InvalidTrustForwardedFor(raw)),
            },
            None => true,
        };

        let routes = var("GEOFENCE_EXEMPT_ROUTES").unwrap_or_else(|| DEFAULT_EXEMPT_ROUTES.into());

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".into()),
            pg_connection_url: var("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/warden".into()),
            jwt_signing_key,
            token_header,
            ip_lookup_url: var("IP_LOOKUP_URL").unwrap_or_else(|| DEFAULT_IP_LOOKUP_URL.into()),
            trust_forwarded_for,
            request_timeout,
            geofence: GeofencePolicy {
                exempt_country: var("GEOFENCE_EXEMPT_COUNTRY")
                    .unwrap_or_else(|| DEFAULT_EXEMPT_COUNTRY.into()),
                routes: GeofencePolicy::parse_routes(&routes)?,
            },
        })
    }
}
