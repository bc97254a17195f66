//! r2d2 connection pool for SQLite.
//!
//! Every pooled connection gets the same pragmas on checkout-time creation:
//! WAL journaling, `synchronous=NORMAL`, foreign keys and a busy timeout.

use std::path::Path;
use std::time::Duration;

use calsync_domain::Result;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::instrument;

use crate::errors::InfraError;

/// Shared SQLite connection pool.
pub type SqlitePool = Pool<SqliteConnectionManager>;

/// Connection checked out of a [`SqlitePool`].
pub type SqliteConnection = PooledConnection<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a pool of at most `max_size` connections to the database at `path`.
///
/// # Errors
/// Returns `CalSyncError::Database` if the first connection cannot be opened.
#[instrument(skip(path), fields(db_path = %path.display()))]
pub fn create_sqlite_pool(path: &Path, max_size: u32) -> Result<SqlitePool> {
    let manager = SqliteConnectionManager::file(path).with_init(apply_connection_pragmas);

    let pool = Pool::builder()
        .max_size(max_size.max(1))
        .connection_timeout(CONNECTION_TIMEOUT)
        .build(manager)
        .map_err(InfraError::from)?;

    Ok(pool)
}

/// Apply per-connection pragmas.
pub fn apply_connection_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA wal_autocheckpoint=1000;
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;",
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn pooled_connections_use_wal() {
        let temp_dir = TempDir::new().unwrap();
        let pool = create_sqlite_pool(&temp_dir.path().join("pool.db"), 2).unwrap();

        let conn = pool.get().unwrap();
        let journal_mode: String =
            conn.pragma_query_value(None, "journal_mode", |row| row.get(0)).unwrap();
        let foreign_keys: i32 =
            conn.pragma_query_value(None, "foreign_keys", |row| row.get(0)).unwrap();

        assert_eq!(journal_mode.to_lowercase(), "wal");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn zero_pool_size_is_clamped() {
        let temp_dir = TempDir::new().unwrap();
        let pool = create_sqlite_pool(&temp_dir.path().join("pool.db"), 0).unwrap();
        assert_eq!(pool.max_size(), 1);
    }
}
