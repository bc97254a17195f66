//! SQLite implementation of the `SyncRecordStore` port.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::SyncRecordStore;
use calsync_domain::{CalSyncError, ResourceType, Result, SyncRecord};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::{debug, instrument};

use super::pool::SqlitePool;
use super::{from_millis, map_join_error, to_millis};
use crate::errors::InfraError;

const SELECT_COLUMNS: &str = "SELECT user_id, resource_type, calendar_id, channel_id, resource_id,
        expiration, sync_token, refreshed_at, updated_at
 FROM sync_records";

/// Sync records keyed by (user, resource type, calendar).
///
/// The user-scoped calendar list record is stored with an empty calendar id
/// so the composite primary key stays `NOT NULL`.
pub struct SqliteSyncRecordRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteSyncRecordRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Run `sql` on the blocking pool and collect every matching record.
    async fn query_records(
        &self,
        sql: String,
        params: Vec<rusqlite::types::Value>,
    ) -> Result<Vec<SyncRecord>> {
        let pool = Arc::clone(&self.pool);
        task::spawn_blocking(move || -> Result<Vec<SyncRecord>> {
            let conn = pool.get().map_err(InfraError::from)?;
            let mut stmt = conn.prepare(&sql).map_err(InfraError::from)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), map_record)
                .map_err(InfraError::from)?;
            let records = rows.collect::<rusqlite::Result<Vec<_>>>().map_err(InfraError::from)?;
            Ok(records)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Run `sql` on the blocking pool and return the first matching record.
    async fn query_record(
        &self,
        sql: String,
        params: Vec<rusqlite::types::Value>,
    ) -> Result<Option<SyncRecord>> {
        let pool = Arc::clone(&self.pool);
        task::spawn_blocking(move || -> Result<Option<SyncRecord>> {
            let conn = pool.get().map_err(InfraError::from)?;
            Ok(select_one(&conn, &sql, params)?)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn select_one(
    conn: &Connection,
    sql: &str,
    params: Vec<rusqlite::types::Value>,
) -> std::result::Result<Option<SyncRecord>, InfraError> {
    let record = conn
        .query_row(sql, rusqlite::params_from_iter(params), map_record)
        .optional()
        .map_err(InfraError::from)?;
    Ok(record)
}

fn calendar_key(calendar_id: Option<&str>) -> String {
    calendar_id.unwrap_or("").to_owned()
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<SyncRecord> {
    let resource_type: String = row.get(1)?;
    let resource_type = resource_type
        .parse::<ResourceType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;
    let calendar_id: String = row.get(2)?;

    Ok(SyncRecord {
        user_id: row.get(0)?,
        resource_type,
        calendar_id: (!calendar_id.is_empty()).then_some(calendar_id),
        channel_id: row.get(3)?,
        resource_id: row.get(4)?,
        expiration: from_millis(row.get(5)?),
        sync_token: row.get(6)?,
        refreshed_at: from_millis(row.get(7)?),
        updated_at: from_millis(row.get(8)?),
    })
}

#[async_trait]
impl SyncRecordStore for SqliteSyncRecordRepository {
    #[instrument(skip(self))]
    async fn get(
        &self,
        user_id: &str,
        resource_type: ResourceType,
        calendar_id: Option<&str>,
    ) -> Result<Option<SyncRecord>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 AND resource_type = ?2 AND calendar_id = ?3"
        );
        self.query_record(
            sql,
            vec![
                user_id.to_owned().into(),
                resource_type.to_string().into(),
                calendar_key(calendar_id).into(),
            ],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_for_user(
        &self,
        user_id: &str,
        resource_type: ResourceType,
    ) -> Result<Vec<SyncRecord>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 AND resource_type = ?2 ORDER BY calendar_id"
        );
        self.query_records(sql, vec![user_id.to_owned().into(), resource_type.to_string().into()])
            .await
    }

    #[instrument(skip(self))]
    async fn list_all(&self, resource_type: ResourceType) -> Result<Vec<SyncRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE resource_type = ?1 ORDER BY user_id, calendar_id");
        self.query_records(sql, vec![resource_type.to_string().into()]).await
    }

    /// Channel ids are minted locally and unique across all records.
    #[instrument(skip(self))]
    async fn find_by_channel_id(&self, channel_id: &str) -> Result<Option<SyncRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE channel_id = ?1");
        self.query_record(sql, vec![channel_id.to_owned().into()]).await
    }

    /// Several users watching one shared calendar share its resource id; the
    /// most recently updated record wins.
    #[instrument(skip(self))]
    async fn find_by_resource_id(&self, resource_id: &str) -> Result<Option<SyncRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE resource_id = ?1 ORDER BY updated_at DESC LIMIT 1");
        self.query_record(sql, vec![resource_id.to_owned().into()]).await
    }

    #[instrument(skip(self, record), fields(user_id = %record.user_id, calendar_id = ?record.calendar_id))]
    async fn save_watch(&self, record: &SyncRecord) -> Result<SyncRecord> {
        record.validate()?;
        let pool = Arc::clone(&self.pool);
        let record = record.clone();

        task::spawn_blocking(move || -> Result<SyncRecord> {
            let conn = pool.get().map_err(InfraError::from)?;
            let resource_type = record.resource_type.to_string();
            let calendar_id = calendar_key(record.calendar_id.as_deref());
            conn.execute(
                "INSERT INTO sync_records (
                    user_id, resource_type, calendar_id, channel_id, resource_id,
                    expiration, sync_token, refreshed_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(user_id, resource_type, calendar_id) DO UPDATE SET
                    channel_id = excluded.channel_id,
                    resource_id = excluded.resource_id,
                    expiration = excluded.expiration,
                    sync_token = excluded.sync_token,
                    refreshed_at = excluded.refreshed_at,
                    updated_at = excluded.updated_at",
                params![
                    record.user_id,
                    resource_type,
                    calendar_id,
                    record.channel_id,
                    record.resource_id,
                    to_millis(record.expiration),
                    record.sync_token,
                    to_millis(record.refreshed_at),
                    Utc::now().timestamp_millis(),
                ],
            )
            .map_err(InfraError::from)?;

            debug!(channel_id = ?record.channel_id, "sync record saved");

            let sql = format!(
                "{SELECT_COLUMNS} WHERE user_id = ?1 AND resource_type = ?2 AND calendar_id = ?3"
            );
            select_one(
                &conn,
                &sql,
                vec![record.user_id.clone().into(), resource_type.into(), calendar_id.into()],
            )?
            .ok_or_else(|| CalSyncError::Internal("saved sync record vanished".into()))
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, sync_token))]
    async fn update_sync_token(
        &self,
        user_id: &str,
        resource_type: ResourceType,
        calendar_id: Option<&str>,
        sync_token: &str,
    ) -> Result<()> {
        let pool = Arc::clone(&self.pool);
        let user_id = user_id.to_owned();
        let calendar_id = calendar_key(calendar_id);
        let sync_token = sync_token.to_owned();

        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(InfraError::from)?;
            conn.execute(
                "INSERT INTO sync_records (user_id, resource_type, calendar_id, sync_token, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, resource_type, calendar_id) DO UPDATE SET
                    sync_token = excluded.sync_token,
                    updated_at = excluded.updated_at",
                params![
                    user_id,
                    resource_type.to_string(),
                    calendar_id,
                    sync_token,
                    Utc::now().timestamp_millis(),
                ],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn update_refreshed_at(
        &self,
        user_id: &str,
        calendar_id: &str,
        refreshed_at: DateTime<Utc>,
    ) -> Result<()> {
        let pool = Arc::clone(&self.pool);
        let user_id = user_id.to_owned();
        let calendar_id = calendar_id.to_owned();

        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(InfraError::from)?;
            conn.execute(
                "UPDATE sync_records SET refreshed_at = ?1, updated_at = ?2
                 WHERE user_id = ?3 AND resource_type = 'events' AND calendar_id = ?4",
                params![
                    refreshed_at.timestamp_millis(),
                    Utc::now().timestamp_millis(),
                    user_id,
                    calendar_id
                ],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn clear_watch(&self, user_id: &str, channel_id: &str) -> Result<bool> {
        let pool = Arc::clone(&self.pool);
        let user_id = user_id.to_owned();
        let channel_id = channel_id.to_owned();

        task::spawn_blocking(move || -> Result<bool> {
            let conn = pool.get().map_err(InfraError::from)?;
            let changed = conn
                .execute(
                    "UPDATE sync_records
                     SET channel_id = NULL, resource_id = NULL, expiration = NULL, updated_at = ?1
                     WHERE user_id = ?2 AND channel_id = ?3",
                    params![Utc::now().timestamp_millis(), user_id, channel_id],
                )
                .map_err(InfraError::from)?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn delete_all_for_user(&self, user_id: &str) -> Result<usize> {
        let pool = Arc::clone(&self.pool);
        let user_id = user_id.to_owned();

        task::spawn_blocking(move || -> Result<usize> {
            let conn = pool.get().map_err(InfraError::from)?;
            let deleted = conn
                .execute("DELETE FROM sync_records WHERE user_id = ?1", params![user_id])
                .map_err(InfraError::from)?;
            debug!(user_id = %user_id, deleted, "sync records deleted");
            Ok(deleted)
        })
        .await
        .map_err(map_join_error)?
    }
}
