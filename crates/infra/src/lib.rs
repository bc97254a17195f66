//! # calsync Infrastructure
//!
//! Infrastructure implementations of the sync engine ports.
//!
//! This crate contains:
//! - SQLite repositories (sync records, events, sessions, credentials)
//! - The Google Calendar v3 client and OAuth token refresh
//! - Configuration loading
//! - The cron-driven maintenance scheduler
//!
//! ## Architecture
//! - Implements traits defined in `calsync-core`
//! - Contains all "impure" code (I/O, HTTP, timers)

pub mod config;
pub mod database;
pub mod errors;
pub mod integrations;
pub mod scheduling;

// Re-export commonly used items
pub use database::{
    DbManager, SqliteCredentialRepository, SqliteEventRepository, SqliteSessionRepository,
    SqliteSyncRecordRepository,
};
pub use errors::InfraError;
pub use integrations::{GoogleCalendarClient, GoogleClientFactory};
pub use scheduling::{MaintenanceScheduler, MaintenanceSchedulerConfig};
