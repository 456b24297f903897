//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `warden_api::models`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorCode};

/// Account status. Only `Active` users may hold a usable session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Deactivated,
    Unverified,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Deactivated => "deactivated",
            UserStatus::Unverified => "unverified",
        }
    }

    pub fn is_active(self) -> bool {
        self == UserStatus::Active
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "deactivated" => Ok(UserStatus::Deactivated),
            "unverified" => Ok(UserStatus::Unverified),
            other => Err(Error::new(
                ErrorCode::InvalidArgument,
                format!("unknown user status=[{other}]"),
            )),
        }
    }
}

/// Domain user, as read from the store.
#[derive(Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Input for creating a user.
#[derive(Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password_hash: String,
    pub status: UserStatus,
}

/// Server-tracked login session. Soft lifecycle: never deleted, and terminal
/// once `deactivated_at` is set.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub ip_address: String,
    pub user_agent: String,
    pub last_refreshed_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_deactivated(&self) -> bool {
        self.deactivated_at.is_some()
    }

    /// Stamp the deactivation time. Returns `false` (and keeps the original
    /// stamp) when the session was already deactivated.
    pub fn deactivate(&mut self, at: DateTime<Utc>) -> bool {
        if self.deactivated_at.is_some() {
            return false;
        }
        self.deactivated_at = Some(at);
        true
    }
}

/// Input for creating a session on login.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub ip_address: String,
    pub user_agent: String,
    pub last_refreshed_at: DateTime<Utc>,
}

/// Claims embedded in session tokens. A snapshot taken at issuance; the live
/// session and user must still be re-checked on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub session_id: i64,
    pub user_id: i64,
    /// User status at issuance.
    pub status: UserStatus,
    /// Absolute expiry (unix timestamp).
    pub exp: i64,
    /// Refresh-due instant (unix timestamp), always before `exp`.
    pub refresh: i64,
}

impl TokenClaims {
    /// Whether the refresh-due instant has passed.
    pub fn requires_refresh(&self) -> bool {
        self.requires_refresh_at(Utc::now())
    }

    pub fn requires_refresh_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.refresh
    }

    pub fn refresh_due(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.refresh, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Per-request caller state, built at request entry and dropped at exit.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub request_id: String,
    /// Resolved origin address; `None` when it could not be determined.
    pub ip_address: Option<String>,
    pub user_agent: String,
    /// Decoded token claims; `None` for anonymous callers.
    pub token: Option<TokenClaims>,
}

impl CallerContext {
    pub fn claims(&self) -> Option<&TokenClaims> {
        self.token.as_ref()
    }
}
