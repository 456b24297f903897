//! Login and logout flows on top of the session authenticator.

use tracing::info;
use warden_core::ResultExt;
use warden_core::auth::SessionAuthenticator;
use warden_core::models::auth::{CallerContext, TokenClaims};

use crate::error::AppResult;

/// Authenticate the caller and return a freshly signed session token.
pub async fn login(
    authenticator: &SessionAuthenticator,
    username: &str,
    password: &str,
    caller: &CallerContext,
) -> AppResult<String> {
    let (user, session) = authenticator
        .login(username, password, caller)
        .await
        .context("Failed to login user")?;
    let token = authenticator.issue_for(&user, &session)?;
    info!(
        request_id = %caller.request_id,
        user_id = user.id,
        session_id = session.id,
        "session token issued"
    );
    Ok(token)
}

/// Deactivate the session the caller's token belongs to.
pub async fn logout(authenticator: &SessionAuthenticator, claims: &TokenClaims) -> AppResult<()> {
    authenticator
        .logout(claims, claims.session_id)
        .await
        .with_context(|| format!("Failed to logout session=[{}]", claims.session_id))?;
    Ok(())
}
