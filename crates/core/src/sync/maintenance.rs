//! Maintenance sweep: renew expiring channels and prune dead users

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use calsync_domain::{
    BatchReport, CalSyncError, MaintenanceConfig, MaintenancePlan, MaintenanceReport,
    PruneResult, RefreshResult, RefreshTarget, ResourceType, SyncRecord,
};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tracing::{error, info, instrument, warn};

use super::clients::ProviderClients;
use super::ports::{AccessGrants, SessionService, SyncRecordStore};
use super::watch::WatchManager;

/// Time windows driving the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceSettings {
    /// Channels expiring within this window are renewed.
    pub refresh_window: Duration,
    /// Channels expired for longer than this without a refresh mark the user
    /// for pruning.
    pub prune_grace: Duration,
}

impl From<&MaintenanceConfig> for MaintenanceSettings {
    fn from(config: &MaintenanceConfig) -> Self {
        Self { refresh_window: config.refresh_window(), prune_grace: config.prune_grace() }
    }
}

/// Select users to prune and channels to refresh.
///
/// Only events records carrying a channel are considered. The two sets are
/// disjoint: a pruned user never has a refresh target.
pub fn plan_maintenance(
    records: &[SyncRecord],
    revoked: &HashSet<String>,
    now: DateTime<Utc>,
    settings: &MaintenanceSettings,
) -> MaintenancePlan {
    let watched: Vec<&SyncRecord> = records
        .iter()
        .filter(|r| r.resource_type == ResourceType::Events && r.has_channel())
        .collect();

    let stale_before = now - settings.prune_grace;
    let to_prune: BTreeSet<&str> = watched
        .iter()
        .filter(|r| {
            if revoked.contains(&r.user_id) {
                return true;
            }
            r.expiration.is_some_and(|expiration| {
                expiration < stale_before && r.refreshed_at.map_or(true, |at| at < expiration)
            })
        })
        .map(|r| r.user_id.as_str())
        .collect();

    let refresh_before = now + settings.refresh_window;
    let to_refresh = watched
        .iter()
        .filter(|r| !to_prune.contains(r.user_id.as_str()))
        .filter(|r| r.expiration.is_some_and(|expiration| expiration <= refresh_before))
        .filter_map(|r| {
            Some(RefreshTarget {
                user_id: r.user_id.clone(),
                calendar_id: r.calendar_id.clone()?,
                channel_id: r.channel_id.clone()?,
                resource_id: r.resource_id.clone()?,
                sync_token: r.sync_token.clone(),
            })
        })
        .collect();

    MaintenancePlan { to_prune: to_prune.into_iter().map(str::to_owned).collect(), to_refresh }
}

/// Runs the sweep against live stores.
pub struct MaintenanceRunner {
    records: Arc<dyn SyncRecordStore>,
    sessions: Arc<dyn SessionService>,
    grants: Arc<dyn AccessGrants>,
    watches: Arc<WatchManager>,
    clients: Arc<ProviderClients>,
    settings: MaintenanceSettings,
}

impl MaintenanceRunner {
    pub fn new(
        records: Arc<dyn SyncRecordStore>,
        sessions: Arc<dyn SessionService>,
        grants: Arc<dyn AccessGrants>,
        watches: Arc<WatchManager>,
        clients: Arc<ProviderClients>,
        settings: MaintenanceSettings,
    ) -> Self {
        Self { records, sessions, grants, watches, clients, settings }
    }

    /// Prune revoked or abandoned users and renew expiring channels.
    ///
    /// Never fails: store errors are logged and yield an empty report, and
    /// per-item failures are recorded in the report.
    #[instrument(skip(self))]
    pub async fn run(&self) -> MaintenanceReport {
        let records = match self.records.list_all(ResourceType::Events).await {
            Ok(records) => records,
            Err(err) => {
                error!(error = %err, "Maintenance could not load sync records");
                return MaintenanceReport::default();
            }
        };

        let revoked: HashSet<String> = match self.grants.revoked_users().await {
            Ok(users) => users.into_iter().collect(),
            Err(err) => {
                warn!(error = %err, "Could not load revoked grants, pruning by expiry only");
                HashSet::new()
            }
        };

        let plan = plan_maintenance(&records, &revoked, Utc::now(), &self.settings);
        info!(
            to_prune = plan.to_prune.len(),
            to_refresh = plan.to_refresh.len(),
            "Maintenance planned"
        );

        let prune_found = plan.to_prune.len();
        let refresh_found = plan.to_refresh.len();
        let (prunes, refreshes) =
            futures::join!(self.prune_users(&plan.to_prune), self.refresh_targets(plan.to_refresh));

        let report = MaintenanceReport {
            prunes: BatchReport { found: prune_found, result: prunes },
            refreshes: BatchReport { found: refresh_found, result: refreshes },
        };
        info!(failures = report.failure_count(), "Maintenance finished");
        report
    }

    async fn prune_users(&self, users: &[String]) -> Vec<PruneResult> {
        join_all(users.iter().map(|user_id| self.prune_user(user_id))).await
    }

    async fn prune_user(&self, user_id: &str) -> PruneResult {
        let stop = match self.clients.for_user(user_id).await {
            Ok(client) => self.watches.stop_all_watches(client.as_ref(), user_id).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &stop {
            warn!(user_id, error = %err, "Prune could not stop every watch");
        }

        let revoke = self.sessions.revoke_sessions_by_user(user_id).await;
        PruneResult { user_id: user_id.to_owned(), stop, revoke }
    }

    async fn refresh_targets(&self, targets: Vec<RefreshTarget>) -> Vec<RefreshResult> {
        let mut by_user: BTreeMap<String, Vec<RefreshTarget>> = BTreeMap::new();
        for target in targets {
            by_user.entry(target.user_id.clone()).or_default().push(target);
        }

        let per_user = by_user.into_iter().map(|(user_id, targets)| async move {
            self.refresh_user(&user_id, targets).await
        });
        join_all(per_user).await.into_iter().flatten().collect()
    }

    /// One client per user; the user's calendars refresh concurrently.
    async fn refresh_user(&self, user_id: &str, targets: Vec<RefreshTarget>) -> Vec<RefreshResult> {
        let client = match self.clients.for_user(user_id).await {
            Ok(client) => client,
            Err(err) => return targets.into_iter().map(|t| failed_refresh(t, err.clone())).collect(),
        };

        let refreshes = targets.into_iter().map(|target| {
            let client = Arc::clone(&client);
            async move {
                let result = self.watches.refresh_watch(client.as_ref(), &target).await;
                if let Err(err) = &result {
                    warn!(calendar_id = %target.calendar_id, error = %err, "Refresh failed");
                }
                RefreshResult { user_id: target.user_id, calendar_id: target.calendar_id, result }
            }
        });
        join_all(refreshes).await
    }
}

fn failed_refresh(target: RefreshTarget, error: CalSyncError) -> RefreshResult {
    RefreshResult { user_id: target.user_id, calendar_id: target.calendar_id, result: Err(error) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MaintenanceSettings {
        MaintenanceSettings { refresh_window: Duration::hours(24), prune_grace: Duration::days(7) }
    }

    fn channel(user: &str, calendar: &str, expiration: DateTime<Utc>) -> SyncRecord {
        SyncRecord {
            channel_id: Some(format!("chan-{user}-{calendar}")),
            resource_id: Some(format!("res-{user}-{calendar}")),
            expiration: Some(expiration),
            sync_token: Some(format!("tok-{calendar}")),
            ..SyncRecord::events(user, calendar)
        }
    }

    #[test]
    fn revoked_user_is_pruned_not_refreshed() {
        let now = Utc::now();
        let records = vec![channel("alice", "primary", now + Duration::hours(2))];
        let revoked = HashSet::from(["alice".to_string()]);

        let plan = plan_maintenance(&records, &revoked, now, &settings());

        assert_eq!(plan.to_prune, vec!["alice".to_string()]);
        assert!(plan.to_refresh.is_empty());
    }

    #[test]
    fn channel_inside_window_is_refreshed_with_its_token() {
        let now = Utc::now();
        let records = vec![
            channel("bob", "primary", now + Duration::hours(3)),
            channel("bob", "work", now + Duration::days(5)),
        ];

        let plan = plan_maintenance(&records, &HashSet::new(), now, &settings());

        assert!(plan.to_prune.is_empty());
        assert_eq!(plan.to_refresh.len(), 1);
        assert_eq!(plan.to_refresh[0].calendar_id, "primary");
        assert_eq!(plan.to_refresh[0].sync_token.as_deref(), Some("tok-primary"));
    }

    #[test]
    fn long_expired_unrefreshed_channel_prunes_user() {
        let now = Utc::now();
        let mut stale = channel("carol", "primary", now - Duration::days(8));
        stale.refreshed_at = Some(now - Duration::days(15));
        let records = vec![stale, channel("carol", "work", now + Duration::hours(1))];

        let plan = plan_maintenance(&records, &HashSet::new(), now, &settings());

        assert_eq!(plan.to_prune, vec!["carol".to_string()]);
        assert!(plan.to_refresh.is_empty());
    }

    #[test]
    fn recently_expired_channel_is_refreshed() {
        let now = Utc::now();
        let records = vec![channel("dave", "primary", now - Duration::days(1))];

        let plan = plan_maintenance(&records, &HashSet::new(), now, &settings());

        assert!(plan.to_prune.is_empty());
        assert_eq!(plan.to_refresh.len(), 1);
    }

    #[test]
    fn records_without_channel_are_ignored() {
        let now = Utc::now();
        let records = vec![SyncRecord::events("erin", "primary")];
        let revoked = HashSet::from(["erin".to_string()]);

        let plan = plan_maintenance(&records, &revoked, now, &settings());

        assert_eq!(plan, MaintenancePlan::default());
    }
}
