#![allow(dead_code)]

use std::sync::Arc;

use calsync_infra::database::{
    DbManager, SqliteCredentialRepository, SqliteEventRepository, SqliteSessionRepository,
    SqliteSyncRecordRepository,
};
use tempfile::TempDir;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new temporary database with the schema applied.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("schema should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    pub fn sync_records(&self) -> SqliteSyncRecordRepository {
        SqliteSyncRecordRepository::new(self.manager.pool().clone())
    }

    pub fn events(&self) -> SqliteEventRepository {
        SqliteEventRepository::new(self.manager.pool().clone())
    }

    pub fn sessions(&self) -> SqliteSessionRepository {
        SqliteSessionRepository::new(self.manager.pool().clone())
    }

    pub fn credentials(&self) -> SqliteCredentialRepository {
        SqliteCredentialRepository::new(self.manager.pool().clone())
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}
