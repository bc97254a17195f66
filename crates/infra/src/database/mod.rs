//! SQLite persistence adapters

pub mod credential_repository;
pub mod event_repository;
pub mod manager;
pub mod pool;
pub mod session_repository;
pub mod sync_record_repository;

pub use credential_repository::SqliteCredentialRepository;
pub use event_repository::SqliteEventRepository;
pub use manager::DbManager;
pub use pool::{create_sqlite_pool, SqliteConnection, SqlitePool};
pub use session_repository::SqliteSessionRepository;
pub use sync_record_repository::SqliteSyncRecordRepository;

use calsync_domain::CalSyncError;
use chrono::{DateTime, Utc};
use tokio::task::JoinError;

pub(crate) fn to_millis(value: Option<DateTime<Utc>>) -> Option<i64> {
    value.map(|ts| ts.timestamp_millis())
}

pub(crate) fn from_millis(value: Option<i64>) -> Option<DateTime<Utc>> {
    value.and_then(DateTime::from_timestamp_millis)
}

pub(crate) fn map_join_error(err: JoinError) -> CalSyncError {
    if err.is_cancelled() {
        CalSyncError::Internal("blocking database task cancelled".into())
    } else {
        CalSyncError::Internal(format!("blocking database task failed: {err}"))
    }
}
