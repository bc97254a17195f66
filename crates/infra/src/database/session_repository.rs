//! SQLite-backed sessions, implementing the `SessionService` port.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::SessionService;
use calsync_domain::Result;
use chrono::{Duration, Utc};
use rusqlite::params;
use tokio::task;
use tracing::{info, instrument};
use uuid::Uuid;

use super::map_join_error;
use super::pool::SqlitePool;
use crate::errors::InfraError;

pub struct SqliteSessionRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteSessionRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Open a session for `user_id`, returning its id.
    #[instrument(skip(self))]
    pub async fn create_session(&self, user_id: &str, ttl: Option<Duration>) -> Result<String> {
        let pool = Arc::clone(&self.pool);
        let user_id = user_id.to_owned();

        task::spawn_blocking(move || -> Result<String> {
            let id = Uuid::new_v4().to_string();
            let now = Utc::now();
            let conn = pool.get().map_err(InfraError::from)?;
            conn.execute(
                "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id,
                    user_id,
                    now.timestamp_millis(),
                    ttl.map(|ttl| (now + ttl).timestamp_millis())
                ],
            )
            .map_err(InfraError::from)?;
            Ok(id)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Number of unrevoked, unexpired sessions of a user.
    pub async fn active_session_count(&self, user_id: &str) -> Result<usize> {
        let pool = Arc::clone(&self.pool);
        let user_id = user_id.to_owned();

        task::spawn_blocking(move || -> Result<usize> {
            let conn = pool.get().map_err(InfraError::from)?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sessions
                     WHERE user_id = ?1 AND revoked_at IS NULL
                       AND (expires_at IS NULL OR expires_at > ?2)",
                    params![user_id, Utc::now().timestamp_millis()],
                    |row| row.get(0),
                )
                .map_err(InfraError::from)?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl SessionService for SqliteSessionRepository {
    #[instrument(skip(self))]
    async fn revoke_sessions_by_user(&self, user_id: &str) -> Result<usize> {
        let pool = Arc::clone(&self.pool);
        let owned_user = user_id.to_owned();

        let revoked = task::spawn_blocking(move || -> Result<usize> {
            let conn = pool.get().map_err(InfraError::from)?;
            let revoked = conn
                .execute(
                    "UPDATE sessions SET revoked_at = ?1 WHERE user_id = ?2 AND revoked_at IS NULL",
                    params![Utc::now().timestamp_millis(), owned_user],
                )
                .map_err(InfraError::from)?;
            Ok(revoked)
        })
        .await
        .map_err(map_join_error)??;

        info!(user_id, revoked, "sessions revoked");
        Ok(revoked)
    }
}
