//! Port interfaces for sync operations

use std::sync::Arc;

use async_trait::async_trait;
use calsync_domain::{
    AppliedChanges, CalendarListPage, EventChange, EventPage, ProviderResult, ResourceType,
    Result, SyncRecord, WatchRequest, WatchResponse,
};
use chrono::{DateTime, Utc};

/// Persistence of per-user sync records
#[async_trait]
pub trait SyncRecordStore: Send + Sync {
    /// Get the record for (user, resource type, calendar)
    async fn get(
        &self,
        user_id: &str,
        resource_type: ResourceType,
        calendar_id: Option<&str>,
    ) -> Result<Option<SyncRecord>>;

    /// List a user's records of one resource type
    async fn list_for_user(
        &self,
        user_id: &str,
        resource_type: ResourceType,
    ) -> Result<Vec<SyncRecord>>;

    /// List every record of one resource type
    async fn list_all(&self, resource_type: ResourceType) -> Result<Vec<SyncRecord>>;

    /// Find the record holding a locally minted channel id
    async fn find_by_channel_id(&self, channel_id: &str) -> Result<Option<SyncRecord>>;

    /// Find a record watching a provider resource id.
    ///
    /// Users sharing a calendar share its resource id, so prefer
    /// [`SyncRecordStore::find_by_channel_id`] when the channel is known.
    async fn find_by_resource_id(&self, resource_id: &str) -> Result<Option<SyncRecord>>;

    /// Insert or replace the watch fields of a record, returning the stored row
    async fn save_watch(&self, record: &SyncRecord) -> Result<SyncRecord>;

    /// Overwrite the sync token, creating the record if needed
    async fn update_sync_token(
        &self,
        user_id: &str,
        resource_type: ResourceType,
        calendar_id: Option<&str>,
        sync_token: &str,
    ) -> Result<()>;

    /// Record a successful watch refresh
    async fn update_refreshed_at(
        &self,
        user_id: &str,
        calendar_id: &str,
        refreshed_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Clear channel fields of the record holding `channel_id`.
    ///
    /// Returns `false` when no record held the channel.
    async fn clear_watch(&self, user_id: &str, channel_id: &str) -> Result<bool>;

    /// Delete every record of a user, both resource types
    async fn delete_all_for_user(&self, user_id: &str) -> Result<usize>;
}

/// Local event persistence fed by imports
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Apply upserts and deletes for one calendar
    async fn bulk_apply(
        &self,
        user_id: &str,
        calendar_id: &str,
        changes: &[EventChange],
    ) -> Result<AppliedChanges>;

    /// Replace every local event of a calendar with `changes`, atomically.
    ///
    /// On error the previously stored events are left untouched.
    async fn replace_calendar(
        &self,
        user_id: &str,
        calendar_id: &str,
        changes: &[EventChange],
    ) -> Result<AppliedChanges>;

    /// Drop every local event of a user
    async fn delete_all_for_user(&self, user_id: &str) -> Result<usize>;
}

/// Calendar provider operations, bound to one user's credentials
#[async_trait]
pub trait CalendarProviderClient: Send + Sync {
    /// Register a push channel on a calendar's events
    async fn watch_events(&self, request: &WatchRequest) -> ProviderResult<WatchResponse>;

    /// Deregister a push channel
    async fn stop_channel(&self, channel_id: &str, resource_id: &str) -> ProviderResult<()>;

    /// List events changed since `sync_token`, or all events without one.
    ///
    /// Implementations follow pagination to the end.
    async fn list_changed_events(
        &self,
        calendar_id: &str,
        sync_token: Option<&str>,
    ) -> ProviderResult<EventPage>;

    /// List the user's calendars
    async fn list_calendars(&self, sync_token: Option<&str>) -> ProviderResult<CalendarListPage>;
}

/// Builds a provider client for a user
#[async_trait]
pub trait ProviderClientFactory: Send + Sync {
    async fn client_for(&self, user_id: &str) -> ProviderResult<Arc<dyn CalendarProviderClient>>;
}

/// Backend session management
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Revoke every session of a user, returning how many were revoked
    async fn revoke_sessions_by_user(&self, user_id: &str) -> Result<usize>;
}

/// Registry of users whose provider grant has been revoked
#[async_trait]
pub trait AccessGrants: Send + Sync {
    async fn revoked_users(&self) -> Result<Vec<String>>;

    async fn mark_revoked(&self, user_id: &str) -> Result<()>;
}
