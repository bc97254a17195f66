//! Full and incremental event imports

use std::sync::Arc;

use calsync_domain::{
    CalSyncError, CalendarImportResult, EventPage, ImportSummary, ProviderError, ResourceType,
    Result, SyncInfo, SyncRecord, WatchHeal,
};
use chrono::Utc;
use futures::future::join_all;
use tracing::{info, instrument, warn};

use super::ports::{CalendarProviderClient, EventStore, SyncRecordStore};
use super::watch::WatchManager;

/// Pulls provider changes into the event store and advances sync tokens.
pub struct ImportEngine {
    records: Arc<dyn SyncRecordStore>,
    events: Arc<dyn EventStore>,
    watches: Arc<WatchManager>,
}

impl ImportEngine {
    pub fn new(
        records: Arc<dyn SyncRecordStore>,
        events: Arc<dyn EventStore>,
        watches: Arc<WatchManager>,
    ) -> Self {
        Self { records, events, watches }
    }

    /// Re-import every listed calendar from scratch, concurrently.
    #[instrument(skip(self, client, calendar_ids), fields(calendars = calendar_ids.len()))]
    pub async fn import_full(
        &self,
        client: &dyn CalendarProviderClient,
        user_id: &str,
        calendar_ids: &[String],
    ) -> Vec<CalendarImportResult> {
        let imports = calendar_ids.iter().map(|calendar_id| async move {
            CalendarImportResult {
                calendar_id: calendar_id.clone(),
                watch: None,
                result: self.full_import_calendar(client, user_id, calendar_id).await,
            }
        });

        join_all(imports).await
    }

    /// Import changes for every calendar of a user, healing watches first.
    ///
    /// Users without any events record are bootstrapped from their calendar
    /// list. Calendars run concurrently and each reports its own outcome.
    ///
    /// # Errors
    /// Fails only when the user's records cannot be loaded or bootstrapped.
    #[instrument(skip(self, client))]
    pub async fn import_incremental(
        &self,
        client: &dyn CalendarProviderClient,
        user_id: &str,
    ) -> Result<Vec<CalendarImportResult>> {
        let mut records = self.records.list_for_user(user_id, ResourceType::Events).await?;

        if records.is_empty() {
            info!("No sync records, watching calendar list");
            self.watches.start_watching_calendars(client, user_id).await?;
            records = self.records.list_for_user(user_id, ResourceType::Events).await?;
        }

        let passes = records
            .into_iter()
            .filter(|record| record.calendar_id.is_some())
            .map(|record| self.incremental_pass(client, user_id, record));
        let results = join_all(passes).await;

        let failed = results.iter().filter(|r| r.result.is_err()).count();
        info!(calendars = results.len(), failed, "Incremental import finished");
        Ok(results)
    }

    async fn incremental_pass(
        &self,
        client: &dyn CalendarProviderClient,
        user_id: &str,
        record: SyncRecord,
    ) -> CalendarImportResult {
        let calendar_id = record.calendar_id.clone().unwrap_or_default();

        let watch = if record.is_watching(Utc::now()) {
            WatchHeal::Active
        } else {
            match self.watches.start_watch(client, user_id, &calendar_id, None).await {
                Ok(_) => WatchHeal::Started,
                Err(CalSyncError::CalendarWatchExists(_)) => WatchHeal::Active,
                Err(err) => {
                    warn!(calendar_id = %calendar_id, error = %err, "Could not heal watch");
                    WatchHeal::Failed(err)
                }
            }
        };

        let info = SyncInfo {
            calendar_id: calendar_id.clone(),
            channel_id: record.channel_id,
            resource_id: record.resource_id,
            expiration: record.expiration,
            sync_token: record.sync_token,
        };
        let result = self.import_events_by_calendar(client, user_id, &info).await;

        CalendarImportResult { calendar_id, watch: Some(watch), result }
    }

    /// Import one calendar's changes since its stored token.
    ///
    /// A missing token, or one the provider rejects as expired, falls back to
    /// a full import of the calendar.
    ///
    /// # Errors
    /// Provider and store failures other than an expired token.
    #[instrument(skip(self, client, info), fields(calendar_id = %info.calendar_id))]
    pub async fn import_events_by_calendar(
        &self,
        client: &dyn CalendarProviderClient,
        user_id: &str,
        info: &SyncInfo,
    ) -> Result<ImportSummary> {
        let Some(token) = info.sync_token.as_deref().filter(|t| !t.trim().is_empty()) else {
            return self.full_import_calendar(client, user_id, &info.calendar_id).await;
        };

        match client.list_changed_events(&info.calendar_id, Some(token)).await {
            Ok(page) => self.apply_page(user_id, &info.calendar_id, page, false).await,
            Err(ProviderError::SyncTokenExpired(msg)) => {
                warn!(reason = %msg, "Sync token rejected, falling back to full import");
                self.full_import_calendar(client, user_id, &info.calendar_id).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn full_import_calendar(
        &self,
        client: &dyn CalendarProviderClient,
        user_id: &str,
        calendar_id: &str,
    ) -> Result<ImportSummary> {
        let page = client.list_changed_events(calendar_id, None).await?;
        self.apply_page(user_id, calendar_id, page, true).await
    }

    async fn apply_page(
        &self,
        user_id: &str,
        calendar_id: &str,
        page: EventPage,
        full_import: bool,
    ) -> Result<ImportSummary> {
        let (changes, next_sync_token) = page.into_changes();
        let applied = if full_import {
            self.events.replace_calendar(user_id, calendar_id, &changes).await?
        } else {
            self.events.bulk_apply(user_id, calendar_id, &changes).await?
        };

        // No token in the response: keep the old cursor.
        if let Some(token) = next_sync_token.as_deref() {
            self.records
                .update_sync_token(user_id, ResourceType::Events, Some(calendar_id), token)
                .await?;
        }

        info!(
            calendar_id,
            upserted = applied.upserted,
            deleted = applied.deleted,
            full_import,
            "Applied calendar changes"
        );
        Ok(ImportSummary {
            calendar_id: calendar_id.to_owned(),
            upserted: applied.upserted,
            deleted: applied.deleted,
            next_sync_token,
            full_import,
        })
    }
}
