//! Domain types for the calendar sync engine

pub mod events;
pub mod notification;
pub mod reports;
pub mod sync_record;

pub use events::{
    AppliedChanges, CalendarListPage, EventChange, EventPage, EventStatus, ProviderEvent,
};
pub use notification::{
    NotificationOutcome, NotificationPayload, ResourceState, WatchRequest, WatchResponse,
};
pub use reports::{
    BatchReport, CalendarImportResult, CalendarWatchResult, ImportSummary, MaintenancePlan,
    MaintenanceReport, PruneResult, PurgeSummary, RefreshResult, RefreshTarget, StopAllSummary,
    StopWatchResult, WatchAllSummary, WatchHeal, WatchStopFailure,
};
pub use sync_record::{ResourceType, SyncInfo, SyncRecord};
