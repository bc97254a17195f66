use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use calsync_core::{CalendarProviderClient, ProviderClientFactory};
use calsync_domain::{
    CalendarListPage, EventPage, EventStatus, ProviderError, ProviderEvent, ProviderResult,
    WatchRequest, WatchResponse,
};

/// Scripted provider client.
///
/// Watches succeed with `res-<channel>` unless a response is queued. A
/// channel stopped once reports `NotFound` on later stops, like the real
/// provider.
#[derive(Default)]
pub struct MockProviderClient {
    watch_script: Mutex<VecDeque<ProviderResult<WatchResponse>>>,
    watch_calls: Mutex<Vec<WatchRequest>>,
    stop_errors: Mutex<HashMap<String, ProviderError>>,
    stop_default: Mutex<Option<ProviderError>>,
    stop_calls: Mutex<Vec<(String, String)>>,
    stopped: Mutex<HashSet<String>>,
    pages: Mutex<HashMap<(String, Option<String>), ProviderResult<EventPage>>>,
    list_calls: Mutex<Vec<(String, Option<String>)>>,
    calendars: Mutex<Option<ProviderResult<CalendarListPage>>>,
}

pub fn event(id: &str) -> ProviderEvent {
    ProviderEvent {
        id: id.to_owned(),
        status: EventStatus::Confirmed,
        summary: Some(format!("Event {id}")),
        description: None,
        start: None,
        end: None,
        is_all_day: false,
        recurring_event_id: None,
        updated: None,
    }
}

pub fn cancelled(id: &str) -> ProviderEvent {
    ProviderEvent { status: EventStatus::Cancelled, ..event(id) }
}

impl MockProviderClient {
    pub fn queue_watch(&self, response: ProviderResult<WatchResponse>) {
        self.watch_script.lock().unwrap().push_back(response);
    }

    pub fn fail_stop(&self, channel_id: &str, error: ProviderError) {
        self.stop_errors.lock().unwrap().insert(channel_id.to_owned(), error);
    }

    pub fn fail_every_stop(&self, error: ProviderError) {
        *self.stop_default.lock().unwrap() = Some(error);
    }

    /// Script the answer to a listing of `calendar_id` with `sync_token`.
    pub fn page(
        &self,
        calendar_id: &str,
        sync_token: Option<&str>,
        result: ProviderResult<EventPage>,
    ) {
        self.pages
            .lock()
            .unwrap()
            .insert((calendar_id.to_owned(), sync_token.map(str::to_owned)), result);
    }

    pub fn calendars(&self, ids: &[&str], next_sync_token: Option<&str>) {
        *self.calendars.lock().unwrap() = Some(Ok(CalendarListPage {
            calendar_ids: ids.iter().map(|id| (*id).to_owned()).collect(),
            next_sync_token: next_sync_token.map(str::to_owned),
        }));
    }

    pub fn watch_calls(&self) -> Vec<WatchRequest> {
        self.watch_calls.lock().unwrap().clone()
    }

    pub fn stop_calls(&self) -> Vec<(String, String)> {
        self.stop_calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> Vec<(String, Option<String>)> {
        self.list_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarProviderClient for MockProviderClient {
    async fn watch_events(&self, request: &WatchRequest) -> ProviderResult<WatchResponse> {
        self.watch_calls.lock().unwrap().push(request.clone());
        self.watch_script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(WatchResponse {
                resource_id: Some(format!("res-{}", request.channel_id)),
                expiration: None,
            })
        })
    }

    async fn stop_channel(&self, channel_id: &str, resource_id: &str) -> ProviderResult<()> {
        self.stop_calls.lock().unwrap().push((channel_id.to_owned(), resource_id.to_owned()));

        if let Some(error) = self.stop_errors.lock().unwrap().get(channel_id) {
            return Err(error.clone());
        }
        if let Some(error) = self.stop_default.lock().unwrap().as_ref() {
            return Err(error.clone());
        }
        if !self.stopped.lock().unwrap().insert(channel_id.to_owned()) {
            return Err(ProviderError::NotFound(format!("channel {channel_id}")));
        }
        Ok(())
    }

    async fn list_changed_events(
        &self,
        calendar_id: &str,
        sync_token: Option<&str>,
    ) -> ProviderResult<EventPage> {
        let key = (calendar_id.to_owned(), sync_token.map(str::to_owned));
        self.list_calls.lock().unwrap().push(key.clone());
        self.pages.lock().unwrap().get(&key).cloned().unwrap_or_else(|| Ok(EventPage::default()))
    }

    async fn list_calendars(&self, _sync_token: Option<&str>) -> ProviderResult<CalendarListPage> {
        self.calendars.lock().unwrap().clone().unwrap_or_else(|| Ok(CalendarListPage::default()))
    }
}

/// Hands out the shared mock client; revoked users get `AccessRevoked`.
pub struct MockClientFactory {
    client: Arc<MockProviderClient>,
    revoked: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockClientFactory {
    pub fn new(client: Arc<MockProviderClient>) -> Self {
        Self { client, revoked: Mutex::default(), calls: Mutex::default() }
    }

    pub fn revoke(&self, user_id: &str) {
        self.revoked.lock().unwrap().insert(user_id.to_owned());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClientFactory for MockClientFactory {
    async fn client_for(&self, user_id: &str) -> ProviderResult<Arc<dyn CalendarProviderClient>> {
        self.calls.lock().unwrap().push(user_id.to_owned());
        if self.revoked.lock().unwrap().contains(user_id) {
            return Err(ProviderError::AccessRevoked("invalid_grant".into()));
        }
        Ok(self.client.clone())
    }
}
