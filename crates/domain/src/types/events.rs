//! Provider event model and change sets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Provider-side event status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

impl_domain_status_conversions!(EventStatus {
    Confirmed => "confirmed",
    Tentative => "tentative",
    Cancelled => "cancelled",
});

/// One event as reported by the calendar provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEvent {
    pub id: String,
    pub status: EventStatus,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Start/end were given as dates, not date-times.
    pub is_all_day: bool,
    pub recurring_event_id: Option<String>,
    pub updated: Option<DateTime<Utc>>,
}

impl ProviderEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }
}

/// A single mutation to apply to the local event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum EventChange {
    Upsert(ProviderEvent),
    Delete { event_id: String },
}

impl EventChange {
    pub fn event_id(&self) -> &str {
        match self {
            Self::Upsert(event) => &event.id,
            Self::Delete { event_id } => event_id,
        }
    }
}

impl From<ProviderEvent> for EventChange {
    fn from(event: ProviderEvent) -> Self {
        if event.is_cancelled() {
            Self::Delete { event_id: event.id }
        } else {
            Self::Upsert(event)
        }
    }
}

/// Fully paginated result of an events listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPage {
    pub events: Vec<ProviderEvent>,
    pub next_sync_token: Option<String>,
}

impl EventPage {
    /// Convert the listed events into store mutations.
    pub fn into_changes(self) -> (Vec<EventChange>, Option<String>) {
        let changes = self.events.into_iter().map(EventChange::from).collect();
        (changes, self.next_sync_token)
    }
}

/// Fully paginated result of a calendar list listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarListPage {
    pub calendar_ids: Vec<String>,
    pub next_sync_token: Option<String>,
}

/// Counts reported by the event store after applying a change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedChanges {
    pub upserted: usize,
    pub deleted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, status: EventStatus) -> ProviderEvent {
        ProviderEvent {
            id: id.into(),
            status,
            summary: Some("Standup".into()),
            description: None,
            start: None,
            end: None,
            is_all_day: false,
            recurring_event_id: None,
            updated: None,
        }
    }

    #[test]
    fn cancelled_events_become_deletes() {
        let page = EventPage {
            events: vec![
                event("a", EventStatus::Confirmed),
                event("b", EventStatus::Cancelled),
                event("c", EventStatus::Tentative),
            ],
            next_sync_token: Some("tok2".into()),
        };

        let (changes, token) = page.into_changes();
        assert_eq!(token.as_deref(), Some("tok2"));
        assert!(matches!(&changes[0], EventChange::Upsert(e) if e.id == "a"));
        assert_eq!(changes[1], EventChange::Delete { event_id: "b".into() });
        assert_eq!(changes[2].event_id(), "c");
    }

    #[test]
    fn change_serializes_with_op_tag() {
        let json = serde_json::to_value(EventChange::Delete { event_id: "x".into() }).unwrap();
        assert_eq!(json["op"], "delete");
        assert_eq!(json["event_id"], "x");
    }
}
