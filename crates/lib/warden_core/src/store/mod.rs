//! Session store adapter.
//!
//! The store is the source of truth for session deactivation and user status.
//! Nothing in the core caches what it returns.

pub mod memory;
pub mod postgres;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::auth::{NewSession, NewUser, Session, User};

/// Read/write access to session and user records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a session by id.
    async fn session_by_id(&self, session_id: i64) -> Result<Option<Session>>;

    /// Persist a new session, returning it with its assigned id.
    async fn create_session(&self, session: NewSession) -> Result<Session>;

    /// Persist `last_refreshed_at` and `deactivated_at`.
    ///
    /// Implementations must never clear or overwrite an existing
    /// `deactivated_at`, nor move `last_refreshed_at` backwards.
    async fn update_session(&self, session: &Session) -> Result<()>;

    /// Look up a user by id.
    async fn user_by_id(&self, user_id: i64) -> Result<Option<User>>;

    /// Look up a user by username.
    async fn user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Insert a user unless the username is taken; returns the stored row.
    async fn create_user_if_absent(&self, user: NewUser) -> Result<User>;
}
