//! Local development user seeding.

use tracing::info;

use super::password::hash_password;
use crate::error::{Result, ResultExt};
use crate::models::auth::{NewUser, User, UserStatus};
use crate::store::SessionStore;

/// Ensure an active user with the given credentials exists. An existing
/// user with that username is left untouched.
pub async fn seed_user(store: &dyn SessionStore, username: &str, password: &str) -> Result<User> {
    let password_hash = hash_password(password).context("seed user: hash password")?;
    let user = store
        .create_user_if_absent(NewUser {
            first_name: "Demo".into(),
            last_name: "User".into(),
            username: username.to_string(),
            password_hash,
            status: UserStatus::Active,
        })
        .await
        .with_context(|| format!("seed user username=[{username}]"))?;
    info!(user_id = user.id, username, "seed user ready");
    Ok(user)
}
