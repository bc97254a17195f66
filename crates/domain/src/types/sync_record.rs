//! Sync records: one per (user, resource type, calendar)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CalSyncError, Result};
use crate::impl_domain_status_conversions;

/// Kind of provider resource a sync record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Events of a single calendar.
    Events,
    /// The user's calendar list (user-scoped, no calendar id).
    CalendarList,
}

impl_domain_status_conversions!(ResourceType {
    Events => "events",
    CalendarList => "calendarlist",
});

/// Persisted watch/sync state for one (user, resource type, calendar).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub user_id: String,
    pub resource_type: ResourceType,
    /// Provider calendar id; `None` for [`ResourceType::CalendarList`].
    pub calendar_id: Option<String>,
    pub channel_id: Option<String>,
    pub resource_id: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
    pub sync_token: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncRecord {
    /// Empty events record for a calendar.
    pub fn events(user_id: impl Into<String>, calendar_id: impl Into<String>) -> Self {
        Self::blank(user_id.into(), ResourceType::Events, Some(calendar_id.into()))
    }

    /// Empty calendar list record for a user.
    pub fn calendar_list(user_id: impl Into<String>) -> Self {
        Self::blank(user_id.into(), ResourceType::CalendarList, None)
    }

    fn blank(user_id: String, resource_type: ResourceType, calendar_id: Option<String>) -> Self {
        Self {
            user_id,
            resource_type,
            calendar_id,
            channel_id: None,
            resource_id: None,
            expiration: None,
            sync_token: None,
            refreshed_at: None,
            updated_at: None,
        }
    }

    /// Both channel handles are present, so the channel can be stopped.
    pub fn has_channel(&self) -> bool {
        self.channel_id.as_deref().is_some_and(|id| !id.is_empty())
            && self.resource_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// The record holds a channel that the provider still honours at `now`.
    pub fn is_watching(&self, now: DateTime<Utc>) -> bool {
        self.has_channel() && self.expiration.is_some_and(|expiration| expiration > now)
    }

    /// Non-empty sync token, if any.
    pub fn usable_sync_token(&self) -> Option<&str> {
        self.sync_token.as_deref().filter(|token| !token.trim().is_empty())
    }

    /// Drop the channel fields, keeping the sync token.
    pub fn clear_channel(&mut self) {
        self.channel_id = None;
        self.resource_id = None;
        self.expiration = None;
    }

    /// Check the record invariants before it is persisted.
    ///
    /// # Errors
    /// Returns [`CalSyncError::InvalidInput`] when a channel id lacks its
    /// resource id, or when the calendar id does not match the resource type.
    pub fn validate(&self) -> Result<()> {
        if self.channel_id.is_some() && !self.resource_id.as_deref().is_some_and(|id| !id.is_empty())
        {
            return Err(CalSyncError::InvalidInput(format!(
                "sync record for user {} has a channel id without a resource id",
                self.user_id
            )));
        }

        match (self.resource_type, &self.calendar_id) {
            (ResourceType::Events, None) => Err(CalSyncError::InvalidInput(
                "events sync record requires a calendar id".into(),
            )),
            (ResourceType::CalendarList, Some(_)) => Err(CalSyncError::InvalidInput(
                "calendar list sync record must not carry a calendar id".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Narrow sync state handed to a single-calendar import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInfo {
    pub calendar_id: String,
    pub channel_id: Option<String>,
    pub resource_id: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
    pub sync_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Duration;

    use super::*;

    fn watched(expiration: DateTime<Utc>) -> SyncRecord {
        SyncRecord {
            channel_id: Some("chan-1".into()),
            resource_id: Some("res-1".into()),
            expiration: Some(expiration),
            ..SyncRecord::events("user-1", "primary")
        }
    }

    #[test]
    fn resource_type_string_forms() {
        assert_eq!(ResourceType::CalendarList.to_string(), "calendarlist");
        assert_eq!(ResourceType::from_str("Events").unwrap(), ResourceType::Events);
        assert!(ResourceType::from_str("calendar").is_err());
    }

    #[test]
    fn watching_requires_unexpired_channel() {
        let now = Utc::now();
        assert!(watched(now + Duration::hours(1)).is_watching(now));
        assert!(!watched(now - Duration::seconds(1)).is_watching(now));
        assert!(!SyncRecord::events("user-1", "primary").is_watching(now));
    }

    #[test]
    fn channel_without_resource_is_invalid() {
        let record = SyncRecord {
            channel_id: Some("chan-1".into()),
            ..SyncRecord::events("user-1", "primary")
        };
        assert!(matches!(record.validate(), Err(CalSyncError::InvalidInput(_))));

        let empty_resource = SyncRecord { resource_id: Some(String::new()), ..record };
        assert!(empty_resource.validate().is_err());
    }

    #[test]
    fn calendar_id_must_match_resource_type() {
        let mut list = SyncRecord::calendar_list("user-1");
        assert!(list.validate().is_ok());
        list.calendar_id = Some("primary".into());
        assert!(list.validate().is_err());

        let mut events = SyncRecord::events("user-1", "primary");
        assert!(events.validate().is_ok());
        events.calendar_id = None;
        assert!(events.validate().is_err());
    }

    #[test]
    fn clear_channel_keeps_token() {
        let mut record = watched(Utc::now());
        record.sync_token = Some("tok".into());
        record.clear_channel();
        assert!(!record.has_channel());
        assert!(record.expiration.is_none());
        assert_eq!(record.usable_sync_token(), Some("tok"));
    }

    #[test]
    fn blank_token_is_not_usable() {
        let record =
            SyncRecord { sync_token: Some("  ".into()), ..SyncRecord::events("user-1", "primary") };
        assert_eq!(record.usable_sync_token(), None);
    }
}
