//! Per-item results of batch sync operations
//!
//! Batch operations never short-circuit: every unit of work records its own
//! `Result` here and the caller inspects them afterwards.

use serde::{Deserialize, Serialize};

use super::sync_record::SyncRecord;
use crate::errors::CalSyncError;

/// Outcome of importing one calendar's changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub calendar_id: String,
    pub upserted: usize,
    pub deleted: usize,
    pub next_sync_token: Option<String>,
    /// The calendar was re-imported from scratch (no token or token rejected).
    pub full_import: bool,
}

/// What an incremental pass did about a calendar's watch channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum WatchHeal {
    /// A channel was already running.
    Active,
    /// A new channel was started.
    Started,
    Failed(CalSyncError),
}

/// Per-calendar entry of an incremental import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarImportResult {
    pub calendar_id: String,
    /// Watch healing outcome; `None` for plain full imports.
    pub watch: Option<WatchHeal>,
    pub result: Result<ImportSummary, CalSyncError>,
}

/// Per-calendar entry of a start-watching batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarWatchResult {
    pub calendar_id: String,
    pub result: Result<SyncRecord, CalSyncError>,
}

/// Result of watching every calendar of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchAllSummary {
    pub calendar_list_token: Option<String>,
    pub results: Vec<CalendarWatchResult>,
}

/// A channel that was successfully stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopWatchResult {
    pub channel_id: String,
    pub resource_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStopFailure {
    pub calendar_id: Option<String>,
    pub channel_id: String,
    pub error: CalSyncError,
}

/// Result of stopping every watch of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopAllSummary {
    /// Number of events records processed, skipped ones included.
    pub watch_stop_count: usize,
    pub stopped: usize,
    pub skipped: usize,
    pub failures: Vec<WatchStopFailure>,
}

/// Result of removing a user from sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeSummary {
    pub stop: Result<StopAllSummary, CalSyncError>,
    pub records_deleted: usize,
    pub events_deleted: usize,
}

/// One channel due for renewal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTarget {
    pub user_id: String,
    pub calendar_id: String,
    pub channel_id: String,
    pub resource_id: String,
    pub sync_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    pub user_id: String,
    pub calendar_id: String,
    pub result: Result<SyncRecord, CalSyncError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneResult {
    pub user_id: String,
    pub stop: Result<StopAllSummary, CalSyncError>,
    /// Number of sessions revoked.
    pub revoke: Result<usize, CalSyncError>,
}

/// Count of candidates plus the per-item results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport<T> {
    pub found: usize,
    pub result: Vec<T>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self { found: 0, result: Vec::new() }
    }
}

/// Work selected by a maintenance sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenancePlan {
    pub to_prune: Vec<String>,
    pub to_refresh: Vec<RefreshTarget>,
}

/// Aggregate result of a maintenance sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub prunes: BatchReport<PruneResult>,
    pub refreshes: BatchReport<RefreshResult>,
}

impl MaintenanceReport {
    /// Items whose work failed, for logging.
    pub fn failure_count(&self) -> usize {
        let prune_failures = self
            .prunes
            .result
            .iter()
            .filter(|p| {
                p.stop.as_ref().is_err_and(|e| !e.is_benign()) || p.revoke.is_err()
            })
            .count();
        let refresh_failures = self.refreshes.result.iter().filter(|r| r.result.is_err()).count();
        prune_failures + refresh_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_found_and_result() {
        let report = MaintenanceReport {
            prunes: BatchReport {
                found: 1,
                result: vec![PruneResult {
                    user_id: "u1".into(),
                    stop: Err(CalSyncError::NoWatchesForUser("u1".into())),
                    revoke: Ok(2),
                }],
            },
            refreshes: BatchReport::default(),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["prunes"]["found"], 1);
        assert_eq!(json["prunes"]["result"][0]["userId"], "u1");
        assert_eq!(json["prunes"]["result"][0]["revoke"]["Ok"], 2);
        assert_eq!(json["refreshes"]["found"], 0);
        assert_eq!(report.failure_count(), 0);
    }

    #[test]
    fn failure_count_ignores_benign_stop_errors() {
        let report = MaintenanceReport {
            prunes: BatchReport {
                found: 2,
                result: vec![
                    PruneResult {
                        user_id: "u1".into(),
                        stop: Err(CalSyncError::StopFailed("boom".into())),
                        revoke: Ok(0),
                    },
                    PruneResult {
                        user_id: "u2".into(),
                        stop: Ok(StopAllSummary::default()),
                        revoke: Err(CalSyncError::Database("locked".into())),
                    },
                ],
            },
            refreshes: BatchReport {
                found: 1,
                result: vec![RefreshResult {
                    user_id: "u3".into(),
                    calendar_id: "primary".into(),
                    result: Err(CalSyncError::Provider("500".into())),
                }],
            },
        };
        assert_eq!(report.failure_count(), 3);
    }
}
