//! Google Calendar v3 wire types
//!
//! Only the fields the sync engine reads are modelled; everything else in the
//! provider payloads is ignored by serde.

use calsync_domain::{EventStatus, ProviderEvent};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// `GET /calendars/{id}/events` response page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventsResponse {
    #[serde(default)]
    pub items: Vec<GoogleCalendarEvent>,
    pub next_page_token: Option<String>,
    /// Only present on the last page.
    pub next_sync_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendarEvent {
    pub id: String,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Absent on cancelled instances returned by incremental listings.
    pub start: Option<EventDateTime>,
    pub end: Option<EventDateTime>,
    pub recurring_event_id: Option<String>,
    pub updated: Option<DateTime<Utc>>,
}

/// Either `dateTime` (timed event) or `date` (all-day event).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: Option<DateTime<Utc>>,
    pub date: Option<NaiveDate>,
}

impl EventDateTime {
    fn instant(&self) -> Option<DateTime<Utc>> {
        self.date_time.or_else(|| {
            self.date.and_then(|date| date.and_hms_opt(0, 0, 0)).map(|naive| naive.and_utc())
        })
    }

    fn is_all_day(&self) -> bool {
        self.date_time.is_none() && self.date.is_some()
    }
}

impl From<GoogleCalendarEvent> for ProviderEvent {
    fn from(event: GoogleCalendarEvent) -> Self {
        // Unknown statuses are treated as live events.
        let status = event
            .status
            .as_deref()
            .and_then(|raw| raw.parse::<EventStatus>().ok())
            .unwrap_or(EventStatus::Confirmed);

        Self {
            id: event.id,
            status,
            summary: event.summary.filter(|s| !s.trim().is_empty()),
            description: event.description,
            start: event.start.as_ref().and_then(EventDateTime::instant),
            end: event.end.as_ref().and_then(EventDateTime::instant),
            is_all_day: event.start.as_ref().is_some_and(EventDateTime::is_all_day),
            recurring_event_id: event.recurring_event_id,
            updated: event.updated,
        }
    }
}

/// `GET /users/me/calendarList` response page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendarListResponse {
    #[serde(default)]
    pub items: Vec<GoogleCalendarListEntry>,
    pub next_page_token: Option<String>,
    pub next_sync_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Body of `POST /calendars/{id}/events/watch`.
#[derive(Debug, Serialize)]
pub struct WatchChannelRequest<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub address: &'a str,
    /// Unix milliseconds, sent as a string like the API's int64 fields.
    pub expiration: String,
}

/// Channel resource returned by a watch call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleChannel {
    pub resource_id: Option<String>,
    /// Unix milliseconds as a string.
    pub expiration: Option<String>,
}

impl GoogleChannel {
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
            .as_deref()
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
    }
}

/// Body of `POST /channels/stop`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopChannelRequest<'a> {
    pub id: &'a str,
    pub resource_id: &'a str,
}

/// Google token endpoint response for the refresh-token grant.
#[derive(Debug, Deserialize)]
pub struct GoogleTokenRefreshResponse {
    pub access_token: String,
    pub expires_in: Option<u64>,
}
