//! Application constants
//!
//! Centralized location for domain-level defaults used throughout the
//! workspace.

// Provider endpoints
pub const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

// Watch channel lifetime
pub const DEFAULT_CHANNEL_TTL_SECS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_EXPIRATION_MARGIN_SECS: i64 = 5 * 60;

// Maintenance sweep
pub const DEFAULT_MAINTENANCE_CRON: &str = "0 0 */6 * * *"; // every 6 hours
pub const DEFAULT_REFRESH_WINDOW_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_PRUNE_GRACE_SECS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_MAINTENANCE_TIMEOUT_SECS: u64 = 600;
