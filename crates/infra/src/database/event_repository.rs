//! SQLite implementation of the `EventStore` port.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::EventStore;
use calsync_domain::{AppliedChanges, EventChange, EventStatus, ProviderEvent, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use rusqlite::types::Type;
use tokio::task;
use tracing::{debug, instrument};

use super::pool::SqlitePool;
use super::{from_millis, map_join_error, to_millis};
use crate::errors::InfraError;

/// Local copy of provider events, keyed by (user, calendar, event id).
pub struct SqliteEventRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteEventRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Events of one calendar ordered by start time; used by read paths and
    /// tests.
    pub async fn list_calendar(
        &self,
        user_id: &str,
        calendar_id: &str,
    ) -> Result<Vec<ProviderEvent>> {
        let pool = Arc::clone(&self.pool);
        let user_id = user_id.to_owned();
        let calendar_id = calendar_id.to_owned();

        task::spawn_blocking(move || -> Result<Vec<ProviderEvent>> {
            let conn = pool.get().map_err(InfraError::from)?;
            let mut stmt = conn
                .prepare(
                    "SELECT event_id, status, summary, description, start_at, end_at,
                            is_all_day, recurring_event_id, provider_updated_at
                     FROM calendar_events
                     WHERE user_id = ?1 AND calendar_id = ?2
                     ORDER BY start_at, event_id",
                )
                .map_err(InfraError::from)?;

            let rows = stmt
                .query_map(params![user_id, calendar_id], |row| {
                    let status: String = row.get(1)?;
                    let status = status.parse::<EventStatus>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into())
                    })?;
                    Ok(ProviderEvent {
                        id: row.get(0)?,
                        status,
                        summary: row.get(2)?,
                        description: row.get(3)?,
                        start: from_millis(row.get(4)?),
                        end: from_millis(row.get(5)?),
                        is_all_day: row.get(6)?,
                        recurring_event_id: row.get(7)?,
                        updated: from_millis(row.get(8)?),
                    })
                })
                .map_err(InfraError::from)?;

            Ok(rows.collect::<rusqlite::Result<Vec<_>>>().map_err(InfraError::from)?)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Apply `changes` in one transaction, first clearing the calendar when
    /// `replace` is set.
    async fn write_changes(
        &self,
        user_id: &str,
        calendar_id: &str,
        changes: &[EventChange],
        replace: bool,
    ) -> Result<AppliedChanges> {
        let pool = Arc::clone(&self.pool);
        let user_id = user_id.to_owned();
        let calendar_id = calendar_id.to_owned();
        let changes = changes.to_vec();

        task::spawn_blocking(move || -> Result<AppliedChanges> {
            let mut conn = pool.get().map_err(InfraError::from)?;
            let tx = conn.transaction().map_err(InfraError::from)?;

            let cleared = if replace {
                tx.execute(
                    "DELETE FROM calendar_events WHERE user_id = ?1 AND calendar_id = ?2",
                    params![user_id, calendar_id],
                )
                .map_err(InfraError::from)?
            } else {
                0
            };
            let applied = apply_changes(&tx, &user_id, &calendar_id, &changes)?;

            tx.commit().map_err(InfraError::from)?;
            debug!(
                cleared,
                upserted = applied.upserted,
                deleted = applied.deleted,
                "event changes applied"
            );
            Ok(applied)
        })
        .await
        .map_err(map_join_error)?
    }
}

/// Deleting an event that was never stored is not an error and does not
/// count towards `deleted`.
fn apply_changes(
    conn: &Connection,
    user_id: &str,
    calendar_id: &str,
    changes: &[EventChange],
) -> std::result::Result<AppliedChanges, InfraError> {
    let synced_at = Utc::now().timestamp_millis();
    let mut applied = AppliedChanges::default();

    let mut upsert = conn
        .prepare_cached(
            "INSERT INTO calendar_events (
                user_id, calendar_id, event_id, status, summary, description,
                start_at, end_at, is_all_day, recurring_event_id,
                provider_updated_at, synced_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(user_id, calendar_id, event_id) DO UPDATE SET
                status = excluded.status,
                summary = excluded.summary,
                description = excluded.description,
                start_at = excluded.start_at,
                end_at = excluded.end_at,
                is_all_day = excluded.is_all_day,
                recurring_event_id = excluded.recurring_event_id,
                provider_updated_at = excluded.provider_updated_at,
                synced_at = excluded.synced_at",
        )
        .map_err(InfraError::from)?;
    let mut delete = conn
        .prepare_cached(
            "DELETE FROM calendar_events
             WHERE user_id = ?1 AND calendar_id = ?2 AND event_id = ?3",
        )
        .map_err(InfraError::from)?;

    for change in changes {
        match change {
            EventChange::Upsert(event) => {
                upsert
                    .execute(params![
                        user_id,
                        calendar_id,
                        event.id,
                        event.status.to_string(),
                        event.summary,
                        event.description,
                        to_millis(event.start),
                        to_millis(event.end),
                        event.is_all_day,
                        event.recurring_event_id,
                        to_millis(event.updated),
                        synced_at,
                    ])
                    .map_err(InfraError::from)?;
                applied.upserted += 1;
            }
            EventChange::Delete { event_id } => {
                applied.deleted += delete
                    .execute(params![user_id, calendar_id, event_id])
                    .map_err(InfraError::from)?;
            }
        }
    }

    Ok(applied)
}

#[async_trait]
impl EventStore for SqliteEventRepository {
    /// Apply a change set in one transaction.
    #[instrument(skip(self, changes), fields(change_count = changes.len()))]
    async fn bulk_apply(
        &self,
        user_id: &str,
        calendar_id: &str,
        changes: &[EventChange],
    ) -> Result<AppliedChanges> {
        self.write_changes(user_id, calendar_id, changes, false).await
    }

    /// Swap a calendar's stored events for `changes` in one transaction; on
    /// failure the previous events stay in place.
    #[instrument(skip(self, changes), fields(change_count = changes.len()))]
    async fn replace_calendar(
        &self,
        user_id: &str,
        calendar_id: &str,
        changes: &[EventChange],
    ) -> Result<AppliedChanges> {
        self.write_changes(user_id, calendar_id, changes, true).await
    }

    #[instrument(skip(self))]
    async fn delete_all_for_user(&self, user_id: &str) -> Result<usize> {
        let pool = Arc::clone(&self.pool);
        let user_id = user_id.to_owned();

        task::spawn_blocking(move || -> Result<usize> {
            let conn = pool.get().map_err(InfraError::from)?;
            let deleted = conn
                .execute("DELETE FROM calendar_events WHERE user_id = ?1", params![user_id])
                .map_err(InfraError::from)?;
            Ok(deleted)
        })
        .await
        .map_err(map_join_error)?
    }
}
