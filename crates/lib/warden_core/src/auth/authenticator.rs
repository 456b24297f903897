//! Session authenticator: token extraction, live session validation, refresh,
//! login and logout.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderName};
use tracing::{debug, info, warn};

use super::TokenError;
use super::jwt::TokenCodec;
use super::password::verify_password;
use crate::error::{Error, ErrorCode, Result, ResultExt};
use crate::models::auth::{CallerContext, NewSession, Session, TokenClaims, User};
use crate::store::SessionStore;

/// Header carrying the session token in both directions.
pub const DEFAULT_TOKEN_HEADER: &str = "x-warden-token";

/// Validates callers against live session and user state.
#[derive(Clone)]
pub struct SessionAuthenticator {
    codec: TokenCodec,
    store: Arc<dyn SessionStore>,
    token_header: HeaderName,
}

impl SessionAuthenticator {
    pub fn new(codec: TokenCodec, store: Arc<dyn SessionStore>, token_header: HeaderName) -> Self {
        Self {
            codec,
            store,
            token_header,
        }
    }

    pub fn token_header(&self) -> &HeaderName {
        &self.token_header
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Decode the token header. A missing or empty header is
    /// [`TokenError::NotProvided`].
    pub fn extract_token_info(&self, headers: &HeaderMap) -> std::result::Result<TokenClaims, TokenError> {
        let Some(value) = headers.get(&self.token_header) else {
            return Err(TokenError::NotProvided);
        };
        let token = value
            .to_str()
            .map_err(|e| TokenError::Invalid(format!("token header: {e}")))?
            .trim();
        if token.is_empty() {
            return Err(TokenError::NotProvided);
        }
        self.codec.decode(token)
    }

    /// Check the claims against the live session and user.
    ///
    /// Checks run in a fixed order so a session owned by someone else is
    /// always reported as `role_forbidden`, whatever its state.
    pub async fn validate_session(&self, claims: &TokenClaims) -> Result<()> {
        let session = self
            .session_by_id(claims.session_id)
            .await
            .with_context(|| format!("Failed to get sessionID=[{}]", claims.session_id))?;

        if session.user_id != claims.user_id {
            return Err(Error::new(
                ErrorCode::RoleForbidden,
                format!(
                    "Failed to check user role for sessionID=[{}] with userID=[{}], and user=[{}]",
                    claims.session_id, session.user_id, claims.user_id
                ),
            ));
        }

        let user = self.user_by_id(session.user_id).await?;

        if !user.status.is_active() {
            return Err(Error::new(
                ErrorCode::InvalidUserStatus,
                format!(
                    "Failed to check for active user=[{}] status=[{}]",
                    claims.user_id, user.status
                ),
            ));
        }

        if session.is_deactivated() {
            return Err(Error::new(
                ErrorCode::SessionExpired,
                format!(
                    "Failed to check for active session sessionID=[{}]",
                    claims.session_id
                ),
            ));
        }

        Ok(())
    }

    /// Issue a replacement token once the refresh-due instant has passed.
    ///
    /// Returns `Ok(None)` while the token is still fresh.
    pub async fn refresh_if_due(&self, claims: &TokenClaims) -> Result<Option<String>> {
        self.refresh_if_due_at(claims, Utc::now()).await
    }

    pub async fn refresh_if_due_at(
        &self,
        claims: &TokenClaims,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        if !claims.requires_refresh_at(now) {
            return Ok(None);
        }

        let mut session = self
            .session_by_id(claims.session_id)
            .await
            .with_context(|| format!("Failed to find session by id=[{}]", claims.session_id))?;

        if session.is_deactivated() {
            return Err(Error::new(
                ErrorCode::SessionExpired,
                format!("Failed to refresh session by id=[{}]", claims.session_id),
            ));
        }

        let user = self.user_by_id(session.user_id).await?;

        if !user.status.is_active() {
            return Err(Error::new(
                ErrorCode::InvalidUserStatus,
                format!(
                    "Failed to refresh session id=[{}] for user id=[{}]",
                    claims.session_id, session.user_id
                ),
            ));
        }

        session.last_refreshed_at = now;
        if let Err(e) = self.store.update_session(&session).await {
            warn!(
                session_id = session.id,
                error = %e,
                "Failed to update last refreshed at for session"
            );
        }

        let token = self.issue_for(&user, &session)?;
        debug!(session_id = session.id, user_id = user.id, "session token refreshed");
        Ok(Some(token))
    }

    /// Authenticate with username + password and open a new session.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        caller: &CallerContext,
    ) -> Result<(User, Session)> {
        let username = username.trim();
        let password = password.trim();

        let user = self
            .store
            .user_by_username(username)
            .await
            .with_context(|| format!("user by username=[{username}]"))?
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::InvalidCredentials,
                    format!("username does not exist username=[{username}]"),
                )
            })?;

        // A malformed stored hash is indistinguishable from a wrong password.
        let matches = verify_password(password, &user.password_hash)
            .map_err(|e| e.with_code(ErrorCode::InvalidCredentials))?;
        if !matches {
            return Err(Error::new(
                ErrorCode::InvalidCredentials,
                "verify user password",
            ));
        }

        if !user.status.is_active() {
            return Err(Error::new(
                ErrorCode::InvalidUserStatus,
                format!("invalid status for user={}", user.id),
            ));
        }

        let session = self
            .store
            .create_session(NewSession {
                user_id: user.id,
                ip_address: caller.ip_address.clone().unwrap_or_default(),
                user_agent: caller.user_agent.clone(),
                last_refreshed_at: Utc::now(),
            })
            .await
            .with_context(|| format!("create session for user=[{}]", user.id))?;

        info!(user_id = user.id, session_id = session.id, "user logged in");
        Ok((user, session))
    }

    /// Sign a token for a user's session.
    pub fn issue_for(&self, user: &User, session: &Session) -> Result<String> {
        self.codec
            .issue(user.id, session.id, user.status)
            .with_context(|| format!("Failed to generate signed user token for user=[{}]", user.id))
    }

    /// Deactivate the caller's own session. Idempotent.
    pub async fn logout(&self, claims: &TokenClaims, session_id: i64) -> Result<()> {
        if session_id != claims.session_id {
            return Err(Error::new(
                ErrorCode::InvalidCredentials,
                format!(
                    "Cannot logout session=[{session_id}] by current session=[{}]",
                    claims.session_id
                ),
            ));
        }

        let mut session = self.session_by_id(session_id).await?;

        if session.user_id != claims.user_id {
            return Err(Error::new(
                ErrorCode::InvalidCredentials,
                format!(
                    "Cannot logout session=[{session_id}] by user=[{}]",
                    claims.user_id
                ),
            ));
        }

        if !session.deactivate(Utc::now()) {
            debug!(session_id, "session already deactivated");
            return Ok(());
        }

        self.store
            .update_session(&session)
            .await
            .with_context(|| format!("deactivate session=[{session_id}]"))?;

        info!(session_id, user_id = claims.user_id, "session deactivated");
        Ok(())
    }

    async fn session_by_id(&self, session_id: i64) -> Result<Session> {
        self.store
            .session_by_id(session_id)
            .await
            .context("session by id")?
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::RequestFailed,
                    format!("session id=[{session_id}] not found"),
                )
            })
    }

    async fn user_by_id(&self, user_id: i64) -> Result<User> {
        self.store
            .user_by_id(user_id)
            .await
            .with_context(|| format!("Failed to find user by id=[{user_id}]"))?
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::RequestFailed,
                    format!("Failed to find user by id=[{user_id}]: not found"),
                )
            })
    }
}
