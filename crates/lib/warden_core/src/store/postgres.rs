//! PostgreSQL-backed session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::SessionStore;
use crate::error::{Error, ErrorCode, Result, ResultExt};
use crate::models::auth::{NewSession, NewUser, Session, User};

const SESSION_COLUMNS: &str = "id, user_id, ip_address, user_agent, last_refreshed_at, \
     deactivated_at, created_at, updated_at";

const USER_COLUMNS: &str =
    "id, first_name, last_name, username, password_hash, status, created_at, updated_at";

type SessionRow = (
    i64,
    i64,
    String,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
    DateTime<Utc>,
);

type UserRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn session_from_row(row: SessionRow) -> Session {
    let (
        id,
        user_id,
        ip_address,
        user_agent,
        last_refreshed_at,
        deactivated_at,
        created_at,
        updated_at,
    ) = row;
    Session {
        id,
        user_id,
        ip_address,
        user_agent,
        last_refreshed_at,
        deactivated_at,
        created_at,
        updated_at,
    }
}

fn user_from_row(row: UserRow) -> Result<User> {
    let (id, first_name, last_name, username, password_hash, status, created_at, updated_at) = row;
    Ok(User {
        id,
        first_name,
        last_name,
        username,
        password_hash,
        status: status
            .parse()
            .with_context(|| format!("scan status for user id=[{id}]"))?,
        created_at,
        updated_at,
    })
}

/// Session store over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn session_by_id(&self, session_id: i64) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .context("session by id query row error")?;
        Ok(row.map(session_from_row))
    }

    async fn create_session(&self, session: NewSession) -> Result<Session> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "INSERT INTO sessions (user_id, ip_address, user_agent, last_refreshed_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session.user_id)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.last_refreshed_at)
        .fetch_one(&self.pool)
        .await
        .context("save session query row error")?;
        Ok(session_from_row(row))
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sessions \
             SET last_refreshed_at = GREATEST(last_refreshed_at, $1), \
                 deactivated_at = COALESCE(deactivated_at, $2), \
                 updated_at = now() \
             WHERE id = $3",
        )
        .bind(session.last_refreshed_at)
        .bind(session.deactivated_at)
        .bind(session.id)
        .execute(&self.pool)
        .await
        .context("update session exec error")?;

        if result.rows_affected() == 0 {
            return Err(Error::new(
                ErrorCode::NotFound,
                format!("update session id=[{}]: no such session", session.id),
            ));
        }
        Ok(())
    }

    async fn user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("user by id query row error")?;
        row.map(user_from_row).transpose()
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("user by username query row error")?;
        row.map(user_from_row).transpose()
    }

    async fn create_user_if_absent(&self, user: NewUser) -> Result<User> {
        sqlx::query(
            "INSERT INTO users (first_name, last_name, username, password_hash, status) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .execute(&self.pool)
        .await
        .context("save user query error")?;

        self.user_by_username(&user.username).await?.ok_or_else(|| {
            Error::new(
                ErrorCode::RequestFailed,
                format!("user username=[{}] missing after insert", user.username),
            )
        })
    }
}
