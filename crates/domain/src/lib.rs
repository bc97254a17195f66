//! # calsync Domain
//!
//! Domain types for the calendar sync engine.
//!
//! This crate contains:
//! - Sync records, provider events and push notification payloads
//! - The closed error taxonomy ([`CalSyncError`], [`ProviderError`])
//! - Configuration structures and defaults
//!
//! ## Architecture
//! - No dependencies on other calsync crates
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
