//! Geofence exemption policy.
//!
//! Certain method + path pairs may be called without a session when the
//! caller's IP resolves to the exempt country. Resolution failures never
//! grant the exemption.

pub mod ipapi;

pub use ipapi::{DEFAULT_IP_LOOKUP_URL, IpApiClient};

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Country exempted by default.
pub const DEFAULT_EXEMPT_COUNTRY: &str = "Cyprus";

/// Exemption table used when none is configured.
pub const DEFAULT_EXEMPT_ROUTES: &str = "POST /v1/companies,DELETE /v1/companies/{id}";

/// Geofence lookup and configuration errors.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("lookup request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("lookup returned status {0}")]
    Status(u16),

    #[error("lookup rejected ip=[{ip}]: {reason}")]
    Rejected { ip: String, reason: String },

    #[error("not an ip address: {0:?}")]
    InvalidIp(String),

    #[error("invalid lookup url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid exempt route: {0:?}")]
    InvalidRoute(String),
}

/// Location details returned by an IP lookup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryWithIp {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub country_calling_code: Option<String>,
}

/// External IP-to-country lookup.
#[async_trait]
pub trait CountryLookup: Send + Sync {
    async fn country_for_ip(&self, ip: &str) -> Result<CountryWithIp, GeoError>;
}

/// One row of the exemption table: a method and a path template whose
/// `{param}` segments match exactly one non-empty path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExemptRoute {
    pub method: Method,
    pub path: String,
}

impl ExemptRoute {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    /// Exact match after parameter substitution; never a prefix match.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        if self.method != *method {
            return false;
        }
        let mut template = self.path.split('/');
        let mut actual = path.split('/');
        loop {
            match (template.next(), actual.next()) {
                (None, None) => return true,
                (Some(t), Some(a)) => {
                    let is_param = t.len() > 2 && t.starts_with('{') && t.ends_with('}');
                    if is_param {
                        if a.is_empty() {
                            return false;
                        }
                    } else if t != a {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

impl FromStr for ExemptRoute {
    type Err = GeoError;

    /// Parse `"METHOD /path/{param}"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GeoError::InvalidRoute(s.to_string());
        let mut parts = s.split_whitespace();
        let (Some(method), Some(path), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        if !path.starts_with('/') {
            return Err(invalid());
        }
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| invalid())?;
        Ok(Self::new(method, path))
    }
}

/// Exempt country plus the routes it unlocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeofencePolicy {
    pub exempt_country: String,
    pub routes: Vec<ExemptRoute>,
}

impl Default for GeofencePolicy {
    fn default() -> Self {
        Self {
            exempt_country: DEFAULT_EXEMPT_COUNTRY.to_string(),
            routes: Self::parse_routes(DEFAULT_EXEMPT_ROUTES).unwrap_or_default(),
        }
    }
}

impl GeofencePolicy {
    /// Parse a comma-separated exemption table. Blank entries are skipped.
    pub fn parse_routes(table: &str) -> Result<Vec<ExemptRoute>, GeoError> {
        table
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ExemptRoute::from_str)
            .collect()
    }

    pub fn route_is_exempt(&self, method: &Method, path: &str) -> bool {
        self.routes.iter().any(|r| r.matches(method, path))
    }
}

/// Resolves caller IPs against the exemption policy.
#[derive(Clone)]
pub struct GeofenceResolver {
    lookup: Arc<dyn CountryLookup>,
    policy: GeofencePolicy,
}

impl GeofenceResolver {
    pub fn new(lookup: Arc<dyn CountryLookup>, policy: GeofencePolicy) -> Self {
        Self { lookup, policy }
    }

    /// Country name for an IP. A missing or empty IP resolves to `None`
    /// without a lookup.
    pub async fn resolve_country(&self, ip: Option<&str>) -> Result<Option<String>, GeoError> {
        let Some(ip) = ip.map(str::trim).filter(|ip| !ip.is_empty()) else {
            return Ok(None);
        };
        let found = self.lookup.country_for_ip(ip).await?;
        Ok(found.country_name)
    }

    /// Whether the IP resolves to the exempt country. Fails closed.
    pub async fn is_exempt_country(&self, ip: Option<&str>) -> bool {
        match self.resolve_country(ip).await {
            Ok(Some(country)) => country.eq_ignore_ascii_case(&self.policy.exempt_country),
            Ok(None) => false,
            Err(e) => {
                warn!(ip = ?ip, error = %e, "geofence lookup failed, exemption denied");
                false
            }
        }
    }

    /// Whether the request may proceed without a session. The exemption
    /// table is consulted before any lookup is made.
    pub async fn allows_anonymous(&self, method: &Method, path: &str, ip: Option<&str>) -> bool {
        if !self.policy.route_is_exempt(method, path) {
            return false;
        }
        let exempt = self.is_exempt_country(ip).await;
        debug!(%method, path, ip = ?ip, exempt, "geofence exemption evaluated");
        exempt
    }
}
