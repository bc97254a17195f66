//! # calsync Core
//!
//! Sync engine business logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for persistence, the calendar provider and
//!   session management
//! - The watch manager, import engine, notification dispatcher and
//!   maintenance sweep
//! - The [`SyncService`] facade wiring them together
//!
//! ## Architecture Principles
//! - Only depends on `calsync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod sync;

// Re-export specific items to avoid ambiguity
pub use sync::ports::{
    AccessGrants, CalendarProviderClient, EventStore, ProviderClientFactory, SessionService,
    SyncRecordStore,
};
pub use sync::{SyncPorts, SyncService, SyncSettings};
