//! Push notification payloads and watch channel requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reports::ImportSummary;
use crate::impl_domain_status_conversions;

/// `X-Goog-Resource-State` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// Handshake sent once when a channel is created.
    Sync,
    Exists,
    NotExists,
}

impl_domain_status_conversions!(ResourceState {
    Sync => "sync",
    Exists => "exists",
    NotExists => "not_exists",
});

/// Deserialized push notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub resource_state: ResourceState,
    pub channel_id: String,
    pub resource_id: String,
    pub expiration: Option<DateTime<Utc>>,
}

/// Result of dispatching a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "summary", rename_all = "lowercase")]
pub enum NotificationOutcome {
    Ignored,
    Processed(ImportSummary),
}

/// Parameters for registering a push channel on a calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRequest {
    pub calendar_id: String,
    pub channel_id: String,
    pub expiration: DateTime<Utc>,
    pub sync_token: Option<String>,
}

/// Provider answer to a watch request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchResponse {
    pub resource_id: Option<String>,
    /// Expiration granted by the provider, which may be earlier than asked.
    pub expiration: Option<DateTime<Utc>>,
}
