//! Per-operation provider client acquisition

use std::sync::Arc;

use calsync_domain::{CalSyncError, ProviderError, Result};
use tracing::warn;

use super::ports::{CalendarProviderClient, ProviderClientFactory};
use super::watch::WatchManager;

/// Wraps the client factory so a revoked grant triggers user cleanup.
pub struct ProviderClients {
    factory: Arc<dyn ProviderClientFactory>,
    watches: Arc<WatchManager>,
}

impl ProviderClients {
    pub fn new(factory: Arc<dyn ProviderClientFactory>, watches: Arc<WatchManager>) -> Self {
        Self { factory, watches }
    }

    /// Build a client for `user_id`.
    ///
    /// # Errors
    /// [`CalSyncError::AccessRevoked`] after cleanup when the user's grant is
    /// no longer valid; other factory failures translated as usual.
    pub async fn for_user(&self, user_id: &str) -> Result<Arc<dyn CalendarProviderClient>> {
        match self.factory.client_for(user_id).await {
            Ok(client) => Ok(client),
            Err(ProviderError::AccessRevoked(msg)) => {
                warn!(user_id, "Provider grant revoked, removing user sync data");
                self.watches.cleanup_revoked_user(user_id).await;
                Err(CalSyncError::AccessRevoked(msg))
            }
            Err(err) => Err(err.into()),
        }
    }
}
