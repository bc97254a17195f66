//! Calendar sync engine
//!
//! Watch channels, imports, notification dispatch and maintenance, all
//! behind the ports in [`ports`].

pub mod clients;
pub mod import;
pub mod locks;
pub mod maintenance;
pub mod notification;
pub mod ports;
pub mod service;
pub mod watch;

pub use clients::ProviderClients;
pub use import::ImportEngine;
pub use locks::WatchLocks;
pub use maintenance::{plan_maintenance, MaintenanceRunner, MaintenanceSettings};
pub use notification::NotificationDispatcher;
pub use service::{SyncPorts, SyncService, SyncSettings};
pub use watch::WatchManager;
