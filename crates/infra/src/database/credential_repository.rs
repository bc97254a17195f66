//! Provider credentials: stored refresh tokens and the revoked-grant
//! registry (`AccessGrants` port).

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::AccessGrants;
use calsync_domain::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tokio::task;
use tracing::{instrument, warn};

use super::map_join_error;
use super::pool::SqlitePool;
use crate::errors::InfraError;

pub struct SqliteCredentialRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteCredentialRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Store a fresh refresh token; this also clears a previous revocation.
    #[instrument(skip(self, refresh_token))]
    pub async fn store_refresh_token(&self, user_id: &str, refresh_token: &str) -> Result<()> {
        let pool = Arc::clone(&self.pool);
        let user_id = user_id.to_owned();
        let refresh_token = refresh_token.to_owned();

        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(InfraError::from)?;
            conn.execute(
                "INSERT INTO provider_credentials (user_id, refresh_token, revoked_at, updated_at)
                 VALUES (?1, ?2, NULL, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                    refresh_token = excluded.refresh_token,
                    revoked_at = NULL,
                    updated_at = excluded.updated_at",
                params![user_id, refresh_token, Utc::now().timestamp_millis()],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    /// Refresh token of a user whose grant is still valid.
    pub async fn refresh_token(&self, user_id: &str) -> Result<Option<String>> {
        let pool = Arc::clone(&self.pool);
        let user_id = user_id.to_owned();

        task::spawn_blocking(move || -> Result<Option<String>> {
            let conn = pool.get().map_err(InfraError::from)?;
            let token = conn
                .query_row(
                    "SELECT refresh_token FROM provider_credentials
                     WHERE user_id = ?1 AND revoked_at IS NULL",
                    params![user_id],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()
                .map_err(InfraError::from)?
                .flatten();
            Ok(token)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl AccessGrants for SqliteCredentialRepository {
    async fn revoked_users(&self) -> Result<Vec<String>> {
        let pool = Arc::clone(&self.pool);
        task::spawn_blocking(move || -> Result<Vec<String>> {
            let conn = pool.get().map_err(InfraError::from)?;
            let mut stmt = conn
                .prepare(
                    "SELECT user_id FROM provider_credentials
                     WHERE revoked_at IS NOT NULL ORDER BY user_id",
                )
                .map_err(InfraError::from)?;
            let users = stmt
                .query_map([], |row| row.get(0))
                .map_err(InfraError::from)?
                .collect::<rusqlite::Result<Vec<String>>>()
                .map_err(InfraError::from)?;
            Ok(users)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Flag the grant as revoked and forget the refresh token.
    #[instrument(skip(self))]
    async fn mark_revoked(&self, user_id: &str) -> Result<()> {
        let pool = Arc::clone(&self.pool);
        let owned_user = user_id.to_owned();

        task::spawn_blocking(move || -> Result<()> {
            let now = Utc::now().timestamp_millis();
            let conn = pool.get().map_err(InfraError::from)?;
            conn.execute(
                "INSERT INTO provider_credentials (user_id, refresh_token, revoked_at, updated_at)
                 VALUES (?1, NULL, ?2, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET
                    refresh_token = NULL,
                    revoked_at = excluded.revoked_at,
                    updated_at = excluded.updated_at",
                params![owned_user, now],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)??;

        warn!(user_id, "provider grant marked revoked");
        Ok(())
    }
}
