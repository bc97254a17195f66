//! Configuration structures
//!
//! Every section carries serde defaults so a partial TOML/JSON file (or an
//! empty one) still yields a usable configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHANNEL_TTL_SECS, DEFAULT_EXPIRATION_MARGIN_SECS, DEFAULT_MAINTENANCE_CRON,
    DEFAULT_MAINTENANCE_TIMEOUT_SECS, DEFAULT_PRUNE_GRACE_SECS, DEFAULT_REFRESH_WINDOW_SECS,
    GOOGLE_CALENDAR_API_BASE, GOOGLE_TOKEN_URL,
};

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub google: GoogleConfig,
    pub sync: SyncConfig,
    pub maintenance: MaintenanceConfig,
    pub server: ServerConfig,
}

/// SQLite database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "calsync.db".into(), pool_size: 8 }
    }
}

/// Google Calendar API and OAuth client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Public HTTPS address Google posts channel notifications to.
    pub notification_url: String,
    pub api_base: String,
    pub token_url: String,
    pub request_timeout_secs: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            notification_url: String::new(),
            api_base: GOOGLE_CALENDAR_API_BASE.into(),
            token_url: GOOGLE_TOKEN_URL.into(),
            request_timeout_secs: 30,
        }
    }
}

/// Watch channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Requested lifetime of a watch channel.
    pub channel_ttl_secs: i64,
    /// Subtracted from the TTL so local expiry precedes the provider's.
    pub expiration_margin_secs: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            channel_ttl_secs: DEFAULT_CHANNEL_TTL_SECS,
            expiration_margin_secs: DEFAULT_EXPIRATION_MARGIN_SECS,
        }
    }
}

impl SyncConfig {
    /// Effective channel lifetime (TTL minus margin, never negative).
    pub fn channel_lifetime(&self) -> Duration {
        Duration::seconds((self.channel_ttl_secs - self.expiration_margin_secs).max(0))
    }
}

/// Maintenance sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,
    pub cron_expression: String,
    /// Channels expiring within this window are refreshed.
    pub refresh_window_secs: i64,
    /// Channels expired for longer than this without refresh are pruned.
    pub prune_grace_secs: i64,
    pub job_timeout_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: DEFAULT_MAINTENANCE_CRON.into(),
            refresh_window_secs: DEFAULT_REFRESH_WINDOW_SECS,
            prune_grace_secs: DEFAULT_PRUNE_GRACE_SECS,
            job_timeout_secs: DEFAULT_MAINTENANCE_TIMEOUT_SECS,
        }
    }
}

impl MaintenanceConfig {
    pub fn refresh_window(&self) -> Duration {
        Duration::seconds(self.refresh_window_secs)
    }

    pub fn prune_grace(&self) -> Duration {
        Duration::seconds(self.prune_grace_secs)
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Emit logs as JSON lines instead of the human-readable format.
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:3000".into(), json_logs: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_lifetime_subtracts_margin() {
        let config = SyncConfig { channel_ttl_secs: 3600, expiration_margin_secs: 600 };
        assert_eq!(config.channel_lifetime(), Duration::seconds(3000));
    }

    #[test]
    fn channel_lifetime_never_negative() {
        let config = SyncConfig { channel_ttl_secs: 60, expiration_margin_secs: 600 };
        assert_eq!(config.channel_lifetime(), Duration::zero());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml_like_json(r#"{"maintenance": {"enabled": false}}"#);
        assert!(!config.maintenance.enabled);
        assert_eq!(config.maintenance.cron_expression, DEFAULT_MAINTENANCE_CRON);
        assert_eq!(config.sync.channel_ttl_secs, DEFAULT_CHANNEL_TTL_SECS);
        assert_eq!(config.database.pool_size, 8);
    }

    fn toml_like_json(raw: &str) -> Config {
        serde_json::from_str(raw).unwrap()
    }
}
