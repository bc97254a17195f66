//! Sync service facade - the engine's single entry point

use std::sync::Arc;

use calsync_domain::{
    CalendarImportResult, Config, ImportSummary, MaintenanceReport, NotificationOutcome,
    NotificationPayload, PurgeSummary, RefreshTarget, Result, StopAllSummary, StopWatchResult,
    SyncInfo, SyncRecord, WatchAllSummary,
};
use chrono::Duration;
use tracing::{info, instrument, warn};

use super::clients::ProviderClients;
use super::import::ImportEngine;
use super::maintenance::{MaintenanceRunner, MaintenanceSettings};
use super::notification::NotificationDispatcher;
use super::ports::{
    AccessGrants, EventStore, ProviderClientFactory, SessionService, SyncRecordStore,
};
use super::watch::WatchManager;

/// Collaborators injected into [`SyncService`]
#[derive(Clone)]
pub struct SyncPorts {
    pub records: Arc<dyn SyncRecordStore>,
    pub events: Arc<dyn EventStore>,
    pub clients: Arc<dyn ProviderClientFactory>,
    pub sessions: Arc<dyn SessionService>,
    pub grants: Arc<dyn AccessGrants>,
}

/// Engine tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Lifetime requested for new channels, safety margin already removed.
    pub channel_lifetime: Duration,
    pub maintenance: MaintenanceSettings,
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            channel_lifetime: config.sync.channel_lifetime(),
            maintenance: MaintenanceSettings::from(&config.maintenance),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Calendar sync service
///
/// Constructed once at startup. Every operation that talks to the provider
/// asks the client factory exactly once and hands the client down.
pub struct SyncService {
    records: Arc<dyn SyncRecordStore>,
    events: Arc<dyn EventStore>,
    clients: Arc<ProviderClients>,
    watches: Arc<WatchManager>,
    import: Arc<ImportEngine>,
    notifications: NotificationDispatcher,
    maintenance: MaintenanceRunner,
}

impl SyncService {
    /// Create a new sync service
    pub fn new(ports: SyncPorts, settings: SyncSettings) -> Self {
        let watches = Arc::new(WatchManager::new(
            Arc::clone(&ports.records),
            Arc::clone(&ports.sessions),
            Arc::clone(&ports.grants),
            settings.channel_lifetime,
        ));
        let clients = Arc::new(ProviderClients::new(ports.clients, Arc::clone(&watches)));
        let import = Arc::new(ImportEngine::new(
            Arc::clone(&ports.records),
            Arc::clone(&ports.events),
            Arc::clone(&watches),
        ));
        let notifications = NotificationDispatcher::new(
            Arc::clone(&ports.records),
            Arc::clone(&import),
            Arc::clone(&clients),
        );
        let maintenance = MaintenanceRunner::new(
            Arc::clone(&ports.records),
            ports.sessions,
            ports.grants,
            Arc::clone(&watches),
            Arc::clone(&clients),
            settings.maintenance,
        );

        Self {
            records: ports.records,
            events: ports.events,
            clients,
            watches,
            import,
            notifications,
            maintenance,
        }
    }

    /// Handle a provider push notification
    pub async fn handle_notification(
        &self,
        payload: &NotificationPayload,
    ) -> Result<NotificationOutcome> {
        self.notifications.dispatch(payload).await
    }

    /// Start watching one calendar
    #[instrument(skip(self, sync_token))]
    pub async fn start_watch(
        &self,
        user_id: &str,
        calendar_id: &str,
        sync_token: Option<&str>,
    ) -> Result<SyncRecord> {
        let client = self.clients.for_user(user_id).await?;
        self.watches.start_watch(client.as_ref(), user_id, calendar_id, sync_token).await
    }

    /// Start watching every calendar of a user
    #[instrument(skip(self))]
    pub async fn start_watching_calendars(&self, user_id: &str) -> Result<WatchAllSummary> {
        let client = self.clients.for_user(user_id).await?;
        self.watches.start_watching_calendars(client.as_ref(), user_id).await
    }

    /// Stop one channel
    #[instrument(skip(self))]
    pub async fn stop_watch(
        &self,
        user_id: &str,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<StopWatchResult> {
        let client = self.clients.for_user(user_id).await?;
        self.watches.stop_watch(client.as_ref(), user_id, channel_id, resource_id).await
    }

    /// Stop every channel of a user
    #[instrument(skip(self))]
    pub async fn stop_all_watches(&self, user_id: &str) -> Result<StopAllSummary> {
        let client = self.clients.for_user(user_id).await?;
        self.watches.stop_all_watches(client.as_ref(), user_id).await
    }

    /// Replace a channel with a fresh one
    pub async fn refresh_watch(&self, target: &RefreshTarget) -> Result<SyncRecord> {
        let client = self.clients.for_user(&target.user_id).await?;
        self.watches.refresh_watch(client.as_ref(), target).await
    }

    /// Re-import calendars from scratch
    #[instrument(skip(self, calendar_ids))]
    pub async fn import_full(
        &self,
        user_id: &str,
        calendar_ids: &[String],
    ) -> Result<Vec<CalendarImportResult>> {
        let client = self.clients.for_user(user_id).await?;
        Ok(self.import.import_full(client.as_ref(), user_id, calendar_ids).await)
    }

    /// Import changes for every calendar of a user
    #[instrument(skip(self))]
    pub async fn import_incremental(&self, user_id: &str) -> Result<Vec<CalendarImportResult>> {
        let client = self.clients.for_user(user_id).await?;
        self.import.import_incremental(client.as_ref(), user_id).await
    }

    /// Import one calendar's changes
    pub async fn import_events_by_calendar(
        &self,
        user_id: &str,
        info: &SyncInfo,
    ) -> Result<ImportSummary> {
        let client = self.clients.for_user(user_id).await?;
        self.import.import_events_by_calendar(client.as_ref(), user_id, info).await
    }

    /// Run one maintenance sweep
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        self.maintenance.run().await
    }

    /// Delete all sync records of a user
    #[instrument(skip(self))]
    pub async fn delete_all_by_user(&self, user_id: &str) -> Result<usize> {
        let deleted = self.records.delete_all_for_user(user_id).await?;
        info!(deleted, "Deleted user sync records");
        Ok(deleted)
    }

    /// Remove a user from sync entirely.
    ///
    /// Watches are stopped best-effort first; records and events are then
    /// deleted whatever the stop outcome.
    #[instrument(skip(self))]
    pub async fn purge_user(&self, user_id: &str) -> Result<PurgeSummary> {
        let stop = self.stop_all_watches(user_id).await;
        if let Err(err) = &stop {
            if !err.is_benign() {
                warn!(error = %err, "Stopping watches before purge failed");
            }
        }

        let records_deleted = self.records.delete_all_for_user(user_id).await?;
        let events_deleted = self.events.delete_all_for_user(user_id).await?;
        info!(records_deleted, events_deleted, "Purged user");

        Ok(PurgeSummary { stop, records_deleted, events_deleted })
    }
}
