//! Application context - dependency injection container

use std::sync::Arc;

use calsync_core::{SyncPorts, SyncService, SyncSettings};
use calsync_domain::{Config, Result};
use calsync_infra::{
    DbManager, GoogleClientFactory, MaintenanceScheduler, MaintenanceSchedulerConfig,
    SqliteCredentialRepository, SqliteEventRepository, SqliteSessionRepository,
    SqliteSyncRecordRepository,
};
use tracing::info;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub sync: Arc<SyncService>,
    pub clients: Arc<GoogleClientFactory>,
    pub credentials: Arc<SqliteCredentialRepository>,
    pub sessions: Arc<SqliteSessionRepository>,
}

impl AppContext {
    /// Open the database, apply the schema and wire the sync service.
    ///
    /// # Errors
    /// Fails if the database cannot be opened or migrated, or if the HTTP
    /// client for the provider cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;

        let pool = Arc::clone(db.pool());
        let records = Arc::new(SqliteSyncRecordRepository::new(Arc::clone(&pool)));
        let events = Arc::new(SqliteEventRepository::new(Arc::clone(&pool)));
        let sessions = Arc::new(SqliteSessionRepository::new(Arc::clone(&pool)));
        let credentials = Arc::new(SqliteCredentialRepository::new(pool));
        let clients =
            Arc::new(GoogleClientFactory::new(config.google.clone(), Arc::clone(&credentials))?);

        let ports = SyncPorts {
            records,
            events,
            clients: Arc::clone(&clients) as _,
            sessions: Arc::clone(&sessions) as _,
            grants: Arc::clone(&credentials) as _,
        };
        let sync = Arc::new(SyncService::new(ports, SyncSettings::from(&config)));

        info!(database = %db.path().display(), "Application context initialized");

        Ok(Self { config, db, sync, clients, credentials, sessions })
    }

    /// Build the cron-driven maintenance scheduler, or `None` when disabled.
    ///
    /// The scheduler is returned unstarted.
    pub fn maintenance_scheduler(&self) -> Option<MaintenanceScheduler> {
        if !self.config.maintenance.enabled {
            info!("Maintenance scheduler disabled by configuration");
            return None;
        }

        let config = MaintenanceSchedulerConfig::from(&self.config.maintenance);
        Some(MaintenanceScheduler::with_config(config, Arc::clone(&self.sync) as _))
    }
}
