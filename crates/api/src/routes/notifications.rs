//! Google Calendar push notification webhook

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use calsync_domain::{NotificationOutcome, NotificationPayload, ResourceState};
use chrono::{DateTime, Utc};

use super::{timed, AppState};
use crate::error::ApiError;

pub const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";
pub const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";
pub const RESOURCE_ID_HEADER: &str = "x-goog-resource-id";
pub const CHANNEL_EXPIRATION_HEADER: &str = "x-goog-channel-expiration";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/sync/gcal/notifications", post(receive_notification))
}

/// POST /api/sync/gcal/notifications
///
/// Google sends no body; everything needed lives in the `X-Goog-*` headers.
async fn receive_notification(
    State(context): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<NotificationOutcome>, ApiError> {
    let payload = parse_notification_headers(&headers)?;
    let outcome = timed("gcal_notification", context.sync.handle_notification(&payload)).await?;
    Ok(Json(outcome))
}

/// Read a push notification out of Google's channel headers.
///
/// # Errors
/// [`ApiError::BadRequest`] when a required header is missing, not ASCII,
/// or holds an unknown resource state or a malformed expiration.
pub fn parse_notification_headers(headers: &HeaderMap) -> Result<NotificationPayload, ApiError> {
    let resource_state = required(headers, RESOURCE_STATE_HEADER)?
        .parse::<ResourceState>()
        .map_err(ApiError::bad_request)?;
    let channel_id = required(headers, CHANNEL_ID_HEADER)?.to_owned();
    let resource_id = required(headers, RESOURCE_ID_HEADER)?.to_owned();

    let expiration = match header_str(headers, CHANNEL_EXPIRATION_HEADER)? {
        Some(raw) => Some(parse_expiration(raw)?),
        None => None,
    };

    Ok(NotificationPayload { resource_state, channel_id, resource_id, expiration })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| ApiError::bad_request(format!("header {name} is not valid ASCII")))
        })
        .transpose()
}

fn required<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    match header_str(headers, name)? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ApiError::bad_request(format!("missing header {name}"))),
    }
}

/// Expirations arrive in RFC 2822 form, e.g. `Tue, 19 Nov 2013 01:13:52 GMT`.
fn parse_expiration(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc2822(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| ApiError::bad_request(format!("invalid channel expiration {raw:?}: {e}")))
}
