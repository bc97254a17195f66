//! Manual sync, maintenance and user lifecycle endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post, put};
use axum::{Json, Router};
use calsync_domain::{
    CalendarImportResult, MaintenanceReport, PurgeSummary, StopAllSummary, WatchAllSummary,
};
use serde::Deserialize;
use tracing::info;

use super::{timed, AppState};
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sync/maintenance", post(run_maintenance))
        .route("/api/sync/users/{user_id}/import", post(import_user))
        .route("/api/sync/users/{user_id}/watches", post(start_watches).delete(stop_watches))
        .route("/api/sync/users/{user_id}/credentials", put(store_credentials))
        .route("/api/sync/users/{user_id}", delete(purge_user))
}

/// Body of an import request.
///
/// An empty `calendarIds` runs an incremental import over every calendar the
/// user has a record for; otherwise the listed calendars are re-imported
/// from scratch.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[serde(default)]
    pub calendar_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub refresh_token: String,
}

/// POST /api/sync/maintenance - run one sweep now
async fn run_maintenance(State(context): State<AppState>) -> Json<MaintenanceReport> {
    let report = context.sync.run_maintenance().await;
    info!(
        prunes = report.prunes.found,
        refreshes = report.refreshes.found,
        failures = report.failure_count(),
        "Manual maintenance finished"
    );
    Json(report)
}

/// POST /api/sync/users/{user_id}/import
async fn import_user(
    State(context): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<Vec<CalendarImportResult>>, ApiError> {
    let results = if request.calendar_ids.is_empty() {
        timed("import_incremental", context.sync.import_incremental(&user_id)).await?
    } else {
        timed("import_full", context.sync.import_full(&user_id, &request.calendar_ids)).await?
    };
    Ok(Json(results))
}

/// POST /api/sync/users/{user_id}/watches - watch every calendar
async fn start_watches(
    State(context): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<WatchAllSummary>, ApiError> {
    let summary =
        timed("start_watching_calendars", context.sync.start_watching_calendars(&user_id)).await?;
    Ok(Json(summary))
}

/// DELETE /api/sync/users/{user_id}/watches
async fn stop_watches(
    State(context): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<StopAllSummary>, ApiError> {
    let summary = timed("stop_all_watches", context.sync.stop_all_watches(&user_id)).await?;
    Ok(Json(summary))
}

/// PUT /api/sync/users/{user_id}/credentials - store a fresh refresh token
async fn store_credentials(
    State(context): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<CredentialsRequest>,
) -> Result<StatusCode, ApiError> {
    if request.refresh_token.trim().is_empty() {
        return Err(ApiError::bad_request("refreshToken must not be empty"));
    }

    context.credentials.store_refresh_token(&user_id, &request.refresh_token).await?;
    context.clients.forget(&user_id).await;
    info!(user_id = %user_id, "Stored provider grant");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/sync/users/{user_id} - stop watches and delete all sync data
async fn purge_user(
    State(context): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PurgeSummary>, ApiError> {
    let summary = timed("purge_user", context.sync.purge_user(&user_id)).await?;
    context.clients.forget(&user_id).await;
    Ok(Json(summary))
}
