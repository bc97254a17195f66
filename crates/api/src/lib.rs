//! # calsync API
//!
//! HTTP application layer - routes and main entry point.
//!
//! This crate contains:
//! - The Google push notification webhook
//! - Manual sync, maintenance and user purge endpoints
//! - Application context (dependency injection)
//! - Logging bootstrap
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture
//! - Maps [`calsync_domain::CalSyncError`] to HTTP statuses in one place

pub mod context;
pub mod error;
pub mod routes;
pub mod utils;

// Re-export for convenience
pub use context::AppContext;
pub use error::ApiError;
pub use routes::router;
