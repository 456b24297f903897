//! In-process session store for tests and local runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::SessionStore;
use crate::error::{Error, ErrorCode, Result};
use crate::models::auth::{NewSession, NewUser, Session, User, UserStatus};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    sessions: Vec<Session>,
}

/// Session store backed by in-memory vectors. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    tables: Arc<RwLock<Tables>>,
    fail_session_updates: Arc<AtomicBool>,
    fail_user_reads: Arc<AtomicBool>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `update_session` call fail.
    pub fn fail_session_updates(&self, fail: bool) {
        self.fail_session_updates.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `user_by_id` call fail.
    pub fn fail_user_reads(&self, fail: bool) {
        self.fail_user_reads.store(fail, Ordering::SeqCst);
    }

    /// Delete a user row, leaving its sessions in place.
    pub async fn remove_user(&self, user_id: i64) {
        self.tables.write().await.users.retain(|u| u.id != user_id);
    }

    /// Overwrite a stored user's status.
    pub async fn set_user_status(&self, user_id: i64, status: UserStatus) {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.status = status;
            user.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn session_by_id(&self, session_id: i64) -> Result<Option<Session>> {
        let tables = self.tables.read().await;
        Ok(tables.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn create_session(&self, session: NewSession) -> Result<Session> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let session = Session {
            id: tables.sessions.len() as i64 + 1,
            user_id: session.user_id,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            last_refreshed_at: session.last_refreshed_at,
            deactivated_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        if self.fail_session_updates.load(Ordering::SeqCst) {
            return Err(Error::new(
                ErrorCode::RequestFailed,
                format!("update session id=[{}]: store unavailable", session.id),
            ));
        }

        let mut tables = self.tables.write().await;
        let stored = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session.id)
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::NotFound,
                    format!("update session id=[{}]: no such session", session.id),
                )
            })?;
        stored.last_refreshed_at = stored.last_refreshed_at.max(session.last_refreshed_at);
        if stored.deactivated_at.is_none() {
            stored.deactivated_at = session.deactivated_at;
        }
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        if self.fail_user_reads.load(Ordering::SeqCst) {
            return Err(Error::new(
                ErrorCode::RequestFailed,
                format!("user by id=[{user_id}]: store unavailable"),
            ));
        }
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user_if_absent(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.users.iter().find(|u| u.username == user.username) {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let user = User {
            id: tables.users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            password_hash: user.password_hash,
            status: user.status,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }
}
