//! Session token codec (HS256 JWT).

use std::fmt;

use chrono::{DateTime, Duration, Months, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::TokenError;
use crate::models::auth::{TokenClaims, UserStatus};

/// Token lifetime: one calendar year.
const TOKEN_EXPIRY_MONTHS: u32 = 12;

/// Tokens become due for refresh after one hour.
const REFRESH_AFTER_SECS: i64 = 60 * 60;

/// Signs and verifies session tokens with a secret injected at construction.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec. An empty secret is rejected.
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSigningKey);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Issue a token for a session, timed from now.
    pub fn issue(
        &self,
        user_id: i64,
        session_id: i64,
        status: UserStatus,
    ) -> Result<String, TokenError> {
        self.issue_at(user_id, session_id, status, Utc::now())
    }

    /// Issue a token whose expiry and refresh horizons start at `now`.
    pub fn issue_at(
        &self,
        user_id: i64,
        session_id: i64,
        status: UserStatus,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = now
            .checked_add_months(Months::new(TOKEN_EXPIRY_MONTHS))
            .unwrap_or_else(|| now + Duration::days(365));
        let claims = TokenClaims {
            session_id,
            user_id,
            status,
            exp: expires_at.timestamp(),
            refresh: (now + Duration::seconds(REFRESH_AFTER_SECS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Verify signature and structure, returning the claims.
    ///
    /// Refresh semantics are left to the caller; only the standard `exp`
    /// claim is enforced here.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}
