//! HTTP routes

pub mod notifications;
pub mod sync;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::context::AppContext;
use crate::error::ApiError;
use crate::utils::log_request_execution;

/// Shared router state
pub type AppState = Arc<AppContext>;

/// Build the full application router.
pub fn router(context: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(notifications::router())
        .merge(sync::router())
        .with_state(context)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// GET /health - database reachability
async fn health_check(State(context): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    context.db.health_check()?;
    Ok(Json(HealthResponse { status: "ok" }))
}

/// Await `work`, logging its duration and outcome under `route`.
async fn timed<T, E>(route: &'static str, work: impl Future<Output = Result<T, E>>) -> Result<T, E> {
    let started = Instant::now();
    let result = work.await;
    log_request_execution(route, started.elapsed(), result.is_ok());
    result
}
