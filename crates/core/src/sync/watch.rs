//! Watch channel lifecycle: start, stop, refresh

use std::sync::Arc;

use calsync_domain::{
    CalSyncError, CalendarWatchResult, ProviderError, RefreshTarget, ResourceType, Result,
    StopAllSummary, StopWatchResult, SyncRecord, WatchAllSummary, WatchRequest,
    WatchStopFailure,
};
use chrono::{Duration, Utc};
use futures::future::join_all;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::locks::WatchLocks;
use super::ports::{AccessGrants, CalendarProviderClient, SessionService, SyncRecordStore};

/// Creates, stops and renews push channels.
///
/// The provider client is always passed in by the caller; the manager itself
/// holds no per-user state besides the keyed start locks.
pub struct WatchManager {
    records: Arc<dyn SyncRecordStore>,
    sessions: Arc<dyn SessionService>,
    grants: Arc<dyn AccessGrants>,
    locks: WatchLocks,
    channel_lifetime: Duration,
}

impl WatchManager {
    pub fn new(
        records: Arc<dyn SyncRecordStore>,
        sessions: Arc<dyn SessionService>,
        grants: Arc<dyn AccessGrants>,
        channel_lifetime: Duration,
    ) -> Self {
        Self { records, sessions, grants, locks: WatchLocks::new(), channel_lifetime }
    }

    /// Start watching a calendar's events.
    ///
    /// When `sync_token` is `None` the record keeps whatever token it already
    /// had.
    ///
    /// # Errors
    /// - [`CalSyncError::CalendarWatchExists`] if an unexpired channel exists
    /// - [`CalSyncError::NoResourceId`] if the provider returned no handle
    /// - provider and store errors otherwise
    #[instrument(skip(self, client, sync_token), fields(has_token = sync_token.is_some()))]
    pub async fn start_watch(
        &self,
        client: &dyn CalendarProviderClient,
        user_id: &str,
        calendar_id: &str,
        sync_token: Option<&str>,
    ) -> Result<SyncRecord> {
        let _guard = self.locks.acquire(user_id, calendar_id).await;

        let now = Utc::now();
        let existing = self.records.get(user_id, ResourceType::Events, Some(calendar_id)).await?;
        if let Some(record) = existing.as_ref().filter(|r| r.is_watching(now)) {
            debug!(channel_id = ?record.channel_id, "Watch already running");
            return Err(CalSyncError::CalendarWatchExists(format!(
                "user {user_id} already watches calendar {calendar_id}"
            )));
        }

        let request = WatchRequest {
            calendar_id: calendar_id.to_owned(),
            channel_id: Uuid::new_v4().to_string(),
            expiration: now + self.channel_lifetime,
            sync_token: sync_token.map(str::to_owned),
        };
        let response = client.watch_events(&request).await?;

        let Some(resource_id) = response.resource_id.filter(|id| !id.is_empty()) else {
            error!(channel_id = %request.channel_id, "Provider accepted watch without resource id");
            return Err(CalSyncError::NoResourceId(format!(
                "no resource id returned for calendar {calendar_id}"
            )));
        };

        let previous = existing.unwrap_or_else(|| SyncRecord::events(user_id, calendar_id));
        let record = SyncRecord {
            channel_id: Some(request.channel_id),
            resource_id: Some(resource_id),
            expiration: Some(response.expiration.unwrap_or(request.expiration)),
            sync_token: request.sync_token.or(previous.sync_token),
            ..previous
        };
        record.validate()?;

        let saved = self.records.save_watch(&record).await?;
        info!(channel_id = ?saved.channel_id, expiration = ?saved.expiration, "Started watch");
        Ok(saved)
    }

    /// Stop one channel and clear its record.
    ///
    /// # Errors
    /// - [`CalSyncError::AccessRevoked`] after wiping the user's sync data
    /// - [`CalSyncError::ChannelDoesNotExist`] after clearing the record
    /// - [`CalSyncError::StopFailed`] for any other provider failure, leaving
    ///   the record untouched
    #[instrument(skip(self, client))]
    pub async fn stop_watch(
        &self,
        client: &dyn CalendarProviderClient,
        user_id: &str,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<StopWatchResult> {
        match client.stop_channel(channel_id, resource_id).await {
            Ok(()) => {
                self.records.clear_watch(user_id, channel_id).await?;
                debug!("Stopped watch");
                Ok(StopWatchResult {
                    channel_id: channel_id.to_owned(),
                    resource_id: resource_id.to_owned(),
                })
            }
            Err(ProviderError::AccessRevoked(msg)) => {
                warn!("Access revoked while stopping watch, removing user sync data");
                self.cleanup_revoked_user(user_id).await;
                Err(CalSyncError::AccessRevoked(msg))
            }
            Err(ProviderError::NotFound(_)) => {
                self.records.clear_watch(user_id, channel_id).await?;
                Err(CalSyncError::ChannelDoesNotExist(format!(
                    "channel {channel_id} is unknown to the provider"
                )))
            }
            Err(other) => {
                warn!(error = %other, "Stop watch failed");
                Err(CalSyncError::StopFailed(other.to_string()))
            }
        }
    }

    /// Stop every events watch of a user, one at a time.
    ///
    /// Each stop is attempted regardless of earlier failures.
    ///
    /// # Errors
    /// [`CalSyncError::NoWatchesForUser`] when the user has no events records.
    #[instrument(skip(self, client))]
    pub async fn stop_all_watches(
        &self,
        client: &dyn CalendarProviderClient,
        user_id: &str,
    ) -> Result<StopAllSummary> {
        let records = self.records.list_for_user(user_id, ResourceType::Events).await?;
        if records.is_empty() {
            return Err(CalSyncError::NoWatchesForUser(format!(
                "user {user_id} has no calendar watches"
            )));
        }

        let mut summary = StopAllSummary { watch_stop_count: records.len(), ..Default::default() };

        for record in records {
            let (Some(channel_id), Some(resource_id)) =
                (record.channel_id.as_deref(), record.resource_id.as_deref())
            else {
                summary.skipped += 1;
                continue;
            };

            match self.stop_watch(client, user_id, channel_id, resource_id).await {
                Ok(_) | Err(CalSyncError::ChannelDoesNotExist(_)) => summary.stopped += 1,
                Err(error) => summary.failures.push(WatchStopFailure {
                    calendar_id: record.calendar_id.clone(),
                    channel_id: channel_id.to_owned(),
                    error,
                }),
            }
        }

        info!(
            processed = summary.watch_stop_count,
            stopped = summary.stopped,
            skipped = summary.skipped,
            failed = summary.failures.len(),
            "Stopped user watches"
        );
        Ok(summary)
    }

    /// Watch every calendar in the user's calendar list.
    ///
    /// # Errors
    /// Fails only when the calendar list itself cannot be fetched or its
    /// token stored; per-calendar failures land in the summary.
    #[instrument(skip(self, client))]
    pub async fn start_watching_calendars(
        &self,
        client: &dyn CalendarProviderClient,
        user_id: &str,
    ) -> Result<WatchAllSummary> {
        let page = client.list_calendars(None).await?;

        if let Some(token) = page.next_sync_token.as_deref() {
            self.records
                .update_sync_token(user_id, ResourceType::CalendarList, None, token)
                .await?;
        }

        let starts = page.calendar_ids.iter().map(|calendar_id| async move {
            CalendarWatchResult {
                calendar_id: calendar_id.clone(),
                result: self.start_watch(client, user_id, calendar_id, None).await,
            }
        });
        let results = join_all(starts).await;

        info!(calendars = results.len(), "Started watching calendars");
        Ok(WatchAllSummary { calendar_list_token: page.next_sync_token, results })
    }

    /// Replace a channel nearing expiration, keeping the last sync token.
    ///
    /// A live channel found at start time counts as the replacement.
    ///
    /// # Errors
    /// Stop failures other than an already-gone channel abort the refresh
    /// before a new channel is created.
    #[instrument(skip(self, client, target), fields(user_id = %target.user_id, calendar_id = %target.calendar_id))]
    pub async fn refresh_watch(
        &self,
        client: &dyn CalendarProviderClient,
        target: &RefreshTarget,
    ) -> Result<SyncRecord> {
        match self
            .stop_watch(client, &target.user_id, &target.channel_id, &target.resource_id)
            .await
        {
            Ok(_) | Err(CalSyncError::ChannelDoesNotExist(_)) => {}
            Err(error) => return Err(error),
        }

        let started = self
            .start_watch(
                client,
                &target.user_id,
                &target.calendar_id,
                target.sync_token.as_deref(),
            )
            .await;
        let mut record = match started {
            Ok(record) => record,
            // Another caller started a channel between our stop and start.
            Err(CalSyncError::CalendarWatchExists(_)) => {
                debug!("Channel already replaced, keeping it");
                self.records
                    .get(&target.user_id, ResourceType::Events, Some(&target.calendar_id))
                    .await?
                    .ok_or_else(|| {
                        CalSyncError::NotFound(format!(
                            "sync record for calendar {} vanished during refresh",
                            target.calendar_id
                        ))
                    })?
            }
            Err(error) => return Err(error),
        };

        let refreshed_at = Utc::now();
        self.records
            .update_refreshed_at(&target.user_id, &target.calendar_id, refreshed_at)
            .await?;
        record.refreshed_at = Some(refreshed_at);
        Ok(record)
    }

    /// Remove every trace of a user whose grant was revoked.
    ///
    /// Sync records are deleted, the grant is flagged and sessions revoked.
    /// Each step is attempted even if an earlier one fails.
    #[instrument(skip(self))]
    pub async fn cleanup_revoked_user(&self, user_id: &str) {
        match self.records.delete_all_for_user(user_id).await {
            Ok(deleted) => info!(deleted, "Deleted sync records of revoked user"),
            Err(err) => error!(error = %err, "Failed to delete sync records of revoked user"),
        }

        if let Err(err) = self.grants.mark_revoked(user_id).await {
            error!(error = %err, "Failed to flag revoked grant");
        }

        if let Err(err) = self.sessions.revoke_sessions_by_user(user_id).await {
            warn!(error = %err, "Failed to revoke sessions of revoked user");
        }
    }
}
