//! Push notification dispatch

use std::sync::Arc;

use calsync_domain::{
    CalSyncError, NotificationOutcome, NotificationPayload, ResourceState, Result, SyncInfo,
};
use tracing::{debug, instrument, warn};

use super::clients::ProviderClients;
use super::import::ImportEngine;
use super::ports::SyncRecordStore;

/// Resolves notifications to their calendar and imports its changes.
pub struct NotificationDispatcher {
    records: Arc<dyn SyncRecordStore>,
    import: Arc<ImportEngine>,
    clients: Arc<ProviderClients>,
}

impl NotificationDispatcher {
    pub fn new(
        records: Arc<dyn SyncRecordStore>,
        import: Arc<ImportEngine>,
        clients: Arc<ProviderClients>,
    ) -> Self {
        Self { records, import, clients }
    }

    /// Handle one push notification.
    ///
    /// Only `exists` notifications trigger an import; the `sync` handshake
    /// and `not_exists` are ignored. The owning record is found by channel
    /// id, falling back to the resource id for channels we no longer hold.
    ///
    /// # Errors
    /// [`CalSyncError::NotFound`] when no record owns the channel or the
    /// resource id, plus any import failure.
    #[instrument(
        skip(self, payload),
        fields(state = %payload.resource_state, channel_id = %payload.channel_id, resource_id = %payload.resource_id)
    )]
    pub async fn dispatch(&self, payload: &NotificationPayload) -> Result<NotificationOutcome> {
        if payload.resource_state != ResourceState::Exists {
            debug!("Ignoring notification");
            return Ok(NotificationOutcome::Ignored);
        }

        let record = match self.records.find_by_channel_id(&payload.channel_id).await? {
            Some(record) => record,
            None => {
                let record =
                    self.records.find_by_resource_id(&payload.resource_id).await?.ok_or_else(
                        || {
                            CalSyncError::NotFound(format!(
                                "no sync record for resource {}",
                                payload.resource_id
                            ))
                        },
                    )?;
                warn!(stored_channel = ?record.channel_id, "Notification from stale channel");
                record
            }
        };

        let Some(calendar_id) = record.calendar_id.clone() else {
            return Err(CalSyncError::NotFound(format!(
                "resource {} is not an events watch",
                payload.resource_id
            )));
        };

        let client = self.clients.for_user(&record.user_id).await?;
        let info = SyncInfo {
            calendar_id,
            channel_id: record.channel_id,
            resource_id: record.resource_id,
            expiration: record.expiration,
            sync_token: record.sync_token,
        };
        let summary =
            self.import.import_events_by_calendar(client.as_ref(), &record.user_id, &info).await?;

        Ok(NotificationOutcome::Processed(summary))
    }
}
