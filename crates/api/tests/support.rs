use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use calsync_api::{router, AppContext};
use calsync_core::SyncRecordStore;
use calsync_domain::{Config, SyncRecord};
use calsync_infra::SqliteSyncRecordRepository;
use chrono::{Duration, Utc};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// Application wired against a throwaway database.
///
/// Provider endpoints point at a closed local port so an accidental network
/// call fails fast instead of reaching Google.
pub struct TestApp {
    pub context: Arc<AppContext>,
    pub records: SqliteSyncRecordRepository,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temporary database directory");

        let mut config = Config::default();
        config.database.path = temp_dir.path().join("calsync.db").display().to_string();
        config.database.pool_size = 2;
        config.google.api_base = "http://127.0.0.1:9/calendar/v3".into();
        config.google.token_url = "http://127.0.0.1:9/token".into();
        config.google.request_timeout_secs = 2;
        config.maintenance.enabled = false;

        let context = Arc::new(AppContext::new(config).expect("failed to build app context"));
        let records = SqliteSyncRecordRepository::new(Arc::clone(context.db.pool()));

        Self { context, records, _temp_dir: temp_dir }
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.context))
    }

    /// Store an events record with a live channel for `user_id`.
    pub async fn seed_watch(&self, user_id: &str, calendar_id: &str) -> SyncRecord {
        let mut record = SyncRecord::events(user_id, calendar_id);
        record.channel_id = Some(format!("chan-{calendar_id}"));
        record.resource_id = Some(format!("res-{calendar_id}"));
        record.expiration = Some(Utc::now() + Duration::days(3));
        record.sync_token = Some("tok1".into());
        self.records.save_watch(&record).await.expect("failed to seed watch")
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.expect("router is infallible");
        read_json(response).await
    }
}

pub async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("failed to read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is not JSON")
    };
    (status, body)
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).expect("valid request")
}

pub fn notification(state: &str, channel_id: &str, resource_id: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/sync/gcal/notifications")
        .header("X-Goog-Resource-State", state)
        .header("X-Goog-Channel-ID", channel_id)
        .header("X-Goog-Resource-ID", resource_id)
        .header("X-Goog-Channel-Expiration", "Tue, 19 Nov 2030 01:13:52 GMT")
        .body(Body::empty())
        .expect("valid request")
}
