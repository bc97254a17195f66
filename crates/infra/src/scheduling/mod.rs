//! Cron-based scheduling of the maintenance sweep
//!
//! The scheduler has an explicit start/stop lifecycle and wraps every async
//! operation in a timeout. Stopping it cancels a sweep that is still running.

pub mod error;
pub mod maintenance_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use maintenance_scheduler::{
    MaintenanceJob, MaintenanceScheduler, MaintenanceSchedulerConfig,
};
