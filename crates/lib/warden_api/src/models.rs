//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::models::auth::{TokenClaims, UserStatus};

/// Credentials posted to the login route.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// The caller's current session as seen through its token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: i64,
    pub user_id: i64,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&TokenClaims> for SessionResponse {
    fn from(claims: &TokenClaims) -> Self {
        Self {
            session_id: claims.session_id,
            user_id: claims.user_id,
            status: claims.status,
            refresh_due_at: claims.refresh_due(),
            expires_at: claims.expires_at(),
        }
    }
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub error_message: String,
}
