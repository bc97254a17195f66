//! Cron scheduler for the channel maintenance sweep.
//!
//! Each tick refreshes watch channels nearing expiration and prunes users
//! whose provider grant was revoked. A tick runs under `job_timeout`; a tick
//! that times out, or is still running when the scheduler stops, is
//! abandoned and the next one starts fresh.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use calsync_infra::scheduling::{MaintenanceJob, MaintenanceScheduler, SchedulerResult};
//!
//! # async fn example(job: Arc<dyn MaintenanceJob>) -> SchedulerResult<()> {
//! let mut scheduler = MaintenanceScheduler::new("0 0 */6 * * *".into(), job);
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use calsync_core::SyncService;
use calsync_domain::{MaintenanceConfig, MaintenanceReport};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Work performed on every tick.
#[async_trait]
pub trait MaintenanceJob: Send + Sync + 'static {
    async fn run_maintenance(&self) -> MaintenanceReport;
}

#[async_trait]
impl MaintenanceJob for SyncService {
    async fn run_maintenance(&self) -> MaintenanceReport {
        SyncService::run_maintenance(self).await
    }
}

/// Configuration for the maintenance scheduler.
#[derive(Debug, Clone)]
pub struct MaintenanceSchedulerConfig {
    /// Six-field cron expression (seconds first).
    pub cron_expression: String,
    /// Timeout applied to a single sweep.
    pub job_timeout: Duration,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
}

impl Default for MaintenanceSchedulerConfig {
    fn default() -> Self {
        Self::from(&MaintenanceConfig::default())
    }
}

impl From<&MaintenanceConfig> for MaintenanceSchedulerConfig {
    fn from(config: &MaintenanceConfig) -> Self {
        Self {
            cron_expression: config.cron_expression.clone(),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Maintenance scheduler with explicit lifecycle management.
pub struct MaintenanceScheduler {
    scheduler: Option<JobScheduler>,
    config: MaintenanceSchedulerConfig,
    /// Cancelled on stop; every tick of the current run holds a clone.
    cancellation: CancellationToken,
    job: Arc<dyn MaintenanceJob>,
}

impl MaintenanceScheduler {
    /// Create a scheduler with default timeouts.
    pub fn new(cron_expression: String, job: Arc<dyn MaintenanceJob>) -> Self {
        let config = MaintenanceSchedulerConfig { cron_expression, ..Default::default() };
        Self::with_config(config, job)
    }

    pub fn with_config(config: MaintenanceSchedulerConfig, job: Arc<dyn MaintenanceJob>) -> Self {
        Self { scheduler: None, config, cancellation: CancellationToken::new(), job }
    }

    /// Register the sweep and start ticking.
    ///
    /// # Errors
    /// `AlreadyRunning` on a second start, `JobRegistrationFailed` for an
    /// invalid cron expression.
    #[instrument(skip(self), fields(cron = %self.config.cron_expression))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?
            .map_err(|source| SchedulerError::StartFailed { source })?;

        self.scheduler = Some(scheduler_instance);

        info!("Maintenance scheduler started");
        Ok(())
    }

    /// Stop ticking and cancel a sweep that is still in flight.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, scheduler.shutdown())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?
            .map_err(|source| SchedulerError::StopFailed { source })?;

        info!("Maintenance scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;
        let job = self.job.clone();
        let job_timeout = self.config.job_timeout;
        let cancel = self.cancellation.clone();

        let job_definition = Job::new_async(self.config.cron_expression.as_str(), move |_id, _lock| {
            let job = job.clone();
            let cancel = cancel.clone();
            Box::pin(async move {
                Self::run_tick(job, job_timeout, cancel).await;
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job_definition.guid();
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "Registered maintenance job");
        Ok(scheduler)
    }

    async fn run_tick(
        job: Arc<dyn MaintenanceJob>,
        job_timeout: Duration,
        cancel: CancellationToken,
    ) {
        if cancel.is_cancelled() {
            return;
        }
        let started = Instant::now();

        let outcome = tokio::select! {
            () = cancel.cancelled() => {
                info!("Maintenance sweep cancelled by shutdown");
                return;
            }
            outcome = tokio::time::timeout(job_timeout, job.run_maintenance()) => outcome,
        };

        match outcome {
            Ok(report) => {
                let failures = report.failure_count();
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                if failures > 0 {
                    warn!(
                        prunes_found = report.prunes.found,
                        refreshes_found = report.refreshes.found,
                        failures,
                        elapsed_ms,
                        "Maintenance sweep finished with failures"
                    );
                } else {
                    info!(
                        prunes_found = report.prunes.found,
                        refreshes_found = report.refreshes.found,
                        elapsed_ms,
                        "Maintenance sweep finished"
                    );
                }
            }
            Err(_) => {
                warn!(timeout_secs = job_timeout.as_secs(), "Maintenance sweep timed out");
            }
        }
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("MaintenanceScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
