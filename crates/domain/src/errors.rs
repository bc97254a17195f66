//! Error types used throughout the sync engine
//!
//! [`CalSyncError`] is the single closed error taxonomy of the workspace.
//! Provider failures arrive as [`ProviderError`] and are translated into it in
//! exactly one place (the `From` impl below).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for calsync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CalSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// A watch is already running for the (user, calendar) pair.
    #[error("Skipped start watch: {0}")]
    CalendarWatchExists(String),

    /// The provider accepted the watch request but returned no resource id.
    #[error("Calendar watch failed: {0}")]
    NoResourceId(String),

    /// The provider grant for the user is no longer valid.
    #[error("Access revoked: {0}")]
    AccessRevoked(String),

    /// Stop requested for a channel the provider no longer knows.
    #[error("Stop ignored, channel does not exist: {0}")]
    ChannelDoesNotExist(String),

    /// Stop-all requested for a user without any event sync records.
    #[error("Ignored stop request: {0}")]
    NoWatchesForUser(String),

    /// The provider rejected the stored sync token.
    #[error("Sync token rejected: {0}")]
    SyncTokenInvalid(String),

    #[error("Stop failed: {0}")]
    StopFailed(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl CalSyncError {
    /// Stable label suitable for structured logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
            Self::CalendarWatchExists(_) => "calendar_watch_exists",
            Self::NoResourceId(_) => "no_resource_id",
            Self::AccessRevoked(_) => "access_revoked",
            Self::ChannelDoesNotExist(_) => "channel_does_not_exist",
            Self::NoWatchesForUser(_) => "no_watches_for_user",
            Self::SyncTokenInvalid(_) => "sync_token_invalid",
            Self::StopFailed(_) => "stop_failed",
            Self::Provider(_) => "provider",
        }
    }

    /// Informational outcomes that callers treat as success.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::CalendarWatchExists(_) | Self::ChannelDoesNotExist(_) | Self::NoWatchesForUser(_)
        )
    }
}

/// Result type alias for calsync operations
pub type Result<T> = std::result::Result<T, CalSyncError>;

/// Classified failure of a calendar provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ProviderError {
    /// The stored grant is no longer valid (revoked or expired refresh token).
    #[error("access revoked: {0}")]
    AccessRevoked(String),

    /// The access token was rejected (HTTP 401); the grant may still be valid.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The addressed channel or resource no longer exists.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The sync token is invalid or expired (HTTP 410).
    #[error("sync token expired: {0}")]
    SyncTokenExpired(String),

    /// Transport failure before any response was received.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Any other unclassified provider response.
    #[error("provider failure: {0}")]
    Other(String),
}

/// Result type alias for provider calls
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

impl From<ProviderError> for CalSyncError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::AccessRevoked(msg) => Self::AccessRevoked(msg),
            ProviderError::Unauthorized(msg) => Self::Provider(msg),
            ProviderError::NotFound(msg) => Self::NotFound(msg),
            ProviderError::SyncTokenExpired(msg) => Self::SyncTokenInvalid(msg),
            ProviderError::Transport(msg) => Self::Network(msg),
            ProviderError::Other(msg) => Self::Provider(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_translate_once() {
        assert!(matches!(
            CalSyncError::from(ProviderError::AccessRevoked("invalid_grant".into())),
            CalSyncError::AccessRevoked(_)
        ));
        assert!(matches!(
            CalSyncError::from(ProviderError::SyncTokenExpired("410".into())),
            CalSyncError::SyncTokenInvalid(_)
        ));
        assert!(matches!(
            CalSyncError::from(ProviderError::Transport("reset".into())),
            CalSyncError::Network(_)
        ));
        assert!(matches!(
            CalSyncError::from(ProviderError::Other("500".into())),
            CalSyncError::Provider(_)
        ));
        assert!(matches!(
            CalSyncError::from(ProviderError::Unauthorized("HTTP 401".into())),
            CalSyncError::Provider(_)
        ));
    }

    #[test]
    fn benign_kinds() {
        assert!(CalSyncError::CalendarWatchExists("c".into()).is_benign());
        assert!(CalSyncError::ChannelDoesNotExist("c".into()).is_benign());
        assert!(CalSyncError::NoWatchesForUser("u".into()).is_benign());
        assert!(!CalSyncError::AccessRevoked("u".into()).is_benign());
        assert!(!CalSyncError::StopFailed("c".into()).is_benign());
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(CalSyncError::NoResourceId("primary".into())).unwrap();
        assert_eq!(json["type"], "NoResourceId");
        assert_eq!(json["message"], "primary");
    }
}
