//! Google Calendar v3 client
//!
//! One [`GoogleCalendarClient`] is bound to a single user's access token and
//! implements the core `CalendarProviderClient` port. HTTP failures are
//! classified into [`ProviderError`] by [`classify_status`] and nowhere else.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::CalendarProviderClient;
use calsync_domain::{
    CalendarListPage, EventPage, GoogleConfig, ProviderError, ProviderEvent, ProviderResult,
    WatchRequest, WatchResponse,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::factory::AccessTokens;
use super::types::{
    GoogleCalendarListResponse, GoogleChannel, GoogleEventsResponse, StopChannelRequest,
    WatchChannelRequest,
};
use crate::errors::transport_error;

const MAX_RESULTS: &str = "2500";
const ERROR_SNIPPET_CHARS: usize = 200;

/// Map a non-success response to a provider error.
///
/// Only `invalid_grant` means the grant is gone: Google reports a revoked
/// refresh token as a 400 from the token endpoint. A 401 from the API just
/// rejects the access token.
pub fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let snippet: String = body.chars().take(ERROR_SNIPPET_CHARS).collect();
    let message = format!("HTTP {}: {}", status.as_u16(), snippet.trim());

    if body.contains("invalid_grant") {
        return ProviderError::AccessRevoked(message);
    }
    match status {
        StatusCode::UNAUTHORIZED => ProviderError::Unauthorized(message),
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        StatusCode::GONE => ProviderError::SyncTokenExpired(message),
        _ => ProviderError::Other(message),
    }
}

/// Pass successful responses through, classify the rest.
pub(crate) async fn check_response(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let error = classify_status(status, &body);
    warn!(status = status.as_u16(), error = %error, "provider request failed");
    Err(error)
}

#[derive(Clone)]
enum BearerToken {
    Fixed(String),
    Cached { user_id: String, tokens: Arc<AccessTokens> },
}

/// Calendar API client bound to one user's access token.
#[derive(Clone)]
pub struct GoogleCalendarClient {
    http: Client,
    api_base: String,
    notification_url: String,
    bearer: BearerToken,
}

impl GoogleCalendarClient {
    /// Client using a fixed access token; a rejected token is not renewed.
    pub fn new(http: Client, config: &GoogleConfig, access_token: impl Into<String>) -> Self {
        Self::with_bearer(http, config, BearerToken::Fixed(access_token.into()))
    }

    /// Client reading `user_id`'s token from `tokens`.
    ///
    /// A request rejected with HTTP 401 is retried once with a freshly
    /// refreshed token.
    pub fn with_token_cache(
        http: Client,
        config: &GoogleConfig,
        user_id: &str,
        tokens: Arc<AccessTokens>,
    ) -> Self {
        Self::with_bearer(http, config, BearerToken::Cached { user_id: user_id.to_owned(), tokens })
    }

    fn with_bearer(http: Client, config: &GoogleConfig, bearer: BearerToken) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            notification_url: config.notification_url.clone(),
            bearer,
        }
    }

    /// Build `{api_base}/{segments...}` with each segment percent-encoded.
    ///
    /// Calendar ids are email-like and may contain `@` or `#`.
    fn url(&self, segments: &[&str]) -> ProviderResult<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| ProviderError::Other(format!("invalid API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::Other("API base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn access_token(&self) -> ProviderResult<String> {
        match &self.bearer {
            BearerToken::Fixed(token) => Ok(token.clone()),
            BearerToken::Cached { user_id, tokens } => Ok(tokens.get(user_id).await?.token),
        }
    }

    async fn execute(&self, request: RequestBuilder) -> ProviderResult<Response> {
        let token = self.access_token().await?;
        let response =
            request.bearer_auth(token).send().await.map_err(|e| transport_error(&e))?;
        check_response(response).await
    }

    /// Send with the current token, renewing it once on HTTP 401.
    async fn send(&self, request: RequestBuilder) -> ProviderResult<Response> {
        let retry = request.try_clone();
        match self.execute(request).await {
            Err(ProviderError::Unauthorized(message)) => {
                let (Some(retry), BearerToken::Cached { user_id, tokens }) = (retry, &self.bearer)
                else {
                    return Err(ProviderError::Unauthorized(message));
                };
                warn!(user_id = %user_id, "Access token rejected, refreshing once");
                tokens.forget(user_id).await;
                self.execute(retry).await
            }
            other => other,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ProviderResult<T> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(|e| transport_error(&e))
    }
}

#[async_trait]
impl CalendarProviderClient for GoogleCalendarClient {
    #[instrument(skip(self, request), fields(calendar_id = %request.calendar_id, channel_id = %request.channel_id))]
    async fn watch_events(&self, request: &WatchRequest) -> ProviderResult<WatchResponse> {
        let url = self.url(&["calendars", &request.calendar_id, "events", "watch"])?;
        let body = WatchChannelRequest {
            id: &request.channel_id,
            kind: "web_hook",
            address: &self.notification_url,
            expiration: request.expiration.timestamp_millis().to_string(),
        };

        let mut builder = self.http.post(url).json(&body);
        if let Some(token) = request.sync_token.as_deref() {
            builder = builder.query(&[("syncToken", token)]);
        }

        let channel: GoogleChannel = self.send_json(builder).await?;
        debug!(resource_id = ?channel.resource_id, "watch channel created");

        Ok(WatchResponse { expiration: channel.expiration(), resource_id: channel.resource_id })
    }

    #[instrument(skip(self))]
    async fn stop_channel(&self, channel_id: &str, resource_id: &str) -> ProviderResult<()> {
        let url = self.url(&["channels", "stop"])?;
        self.send(self.http.post(url).json(&StopChannelRequest { id: channel_id, resource_id }))
            .await?;
        Ok(())
    }

    /// Follows `nextPageToken` until the page carrying `nextSyncToken`.
    #[instrument(skip(self, sync_token), fields(incremental = sync_token.is_some()))]
    async fn list_changed_events(
        &self,
        calendar_id: &str,
        sync_token: Option<&str>,
    ) -> ProviderResult<EventPage> {
        let url = self.url(&["calendars", calendar_id, "events"])?;
        let mut page = EventPage::default();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> =
                vec![("showDeleted", "true"), ("maxResults", MAX_RESULTS)];
            if let Some(token) = sync_token {
                query.push(("syncToken", token));
            }
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response: GoogleEventsResponse =
                self.send_json(self.http.get(url.clone()).query(&query)).await?;

            page.events.extend(response.items.into_iter().map(ProviderEvent::from));
            if response.next_sync_token.is_some() {
                page.next_sync_token = response.next_sync_token;
            }

            match response.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(event_count = page.events.len(), "events listed");
        Ok(page)
    }

    #[instrument(skip(self, sync_token))]
    async fn list_calendars(&self, sync_token: Option<&str>) -> ProviderResult<CalendarListPage> {
        let url = self.url(&["users", "me", "calendarList"])?;
        let mut page = CalendarListPage::default();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = Vec::new();
            if let Some(token) = sync_token {
                query.push(("syncToken", token));
            }
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response: GoogleCalendarListResponse =
                self.send_json(self.http.get(url.clone()).query(&query)).await?;

            page.calendar_ids
                .extend(response.items.into_iter().filter(|entry| !entry.deleted).map(|e| e.id));
            if response.next_sync_token.is_some() {
                page.next_sync_token = response.next_sync_token;
            }

            match response.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_statuses() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "{}"),
            ProviderError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "Channel 'x' not found"),
            ProviderError::NotFound(_)
        ));
        assert!(matches!(classify_status(StatusCode::GONE, ""), ProviderError::SyncTokenExpired(_)));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ProviderError::Other(msg) if msg.contains("500")
        ));
    }

    #[test]
    fn invalid_grant_beats_status() {
        let body = r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#;
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, body),
            ProviderError::AccessRevoked(_)
        ));
    }

    #[test]
    fn url_encodes_calendar_ids() {
        let config = GoogleConfig {
            api_base: "https://example.com/calendar/v3/".into(),
            ..GoogleConfig::default()
        };
        let client = GoogleCalendarClient::new(Client::new(), &config, "token");

        let url = client.url(&["calendars", "team#1@group.calendar.google.com", "events"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/calendar/v3/calendars/team%231@group.calendar.google.com/events"
        );
    }
}
