//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If a required variable is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `CALSYNC_DB_PATH`: SQLite database file path
//! - `CALSYNC_GOOGLE_CLIENT_ID`: OAuth client id
//! - `CALSYNC_GOOGLE_CLIENT_SECRET`: OAuth client secret
//! - `CALSYNC_NOTIFICATION_URL`: public webhook address for channel pushes
//!
//! Optional (defaults from [`Config::default`]):
//! - `CALSYNC_DB_POOL_SIZE`
//! - `CALSYNC_GOOGLE_API_BASE`, `CALSYNC_GOOGLE_TOKEN_URL`
//! - `CALSYNC_CHANNEL_TTL_SECS`, `CALSYNC_EXPIRATION_MARGIN_SECS`
//! - `CALSYNC_MAINTENANCE_ENABLED`, `CALSYNC_MAINTENANCE_CRON`
//! - `CALSYNC_BIND_ADDRESS`, `CALSYNC_JSON_LOGS`
//!
//! ## File Locations
//! The loader probes `calsync.{toml,json}` and `config.{toml,json}` in the
//! working directory, its parent, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use calsync_domain::{CalSyncError, Config, Result};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `CalSyncError::Config` if neither source yields a configuration.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `CalSyncError::Config` if a required variable is missing or a
/// numeric variable does not parse.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("CALSYNC_DB_PATH")?;
    config.google.client_id = env_var("CALSYNC_GOOGLE_CLIENT_ID")?;
    config.google.client_secret = env_var("CALSYNC_GOOGLE_CLIENT_SECRET")?;
    config.google.notification_url = env_var("CALSYNC_NOTIFICATION_URL")?;

    if let Some(pool_size) = env_parse::<u32>("CALSYNC_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }
    if let Ok(api_base) = std::env::var("CALSYNC_GOOGLE_API_BASE") {
        config.google.api_base = api_base;
    }
    if let Ok(token_url) = std::env::var("CALSYNC_GOOGLE_TOKEN_URL") {
        config.google.token_url = token_url;
    }
    if let Some(ttl) = env_parse::<i64>("CALSYNC_CHANNEL_TTL_SECS")? {
        config.sync.channel_ttl_secs = ttl;
    }
    if let Some(margin) = env_parse::<i64>("CALSYNC_EXPIRATION_MARGIN_SECS")? {
        config.sync.expiration_margin_secs = margin;
    }
    config.maintenance.enabled = env_bool("CALSYNC_MAINTENANCE_ENABLED", true);
    if let Ok(cron) = std::env::var("CALSYNC_MAINTENANCE_CRON") {
        config.maintenance.cron_expression = cron;
    }
    if let Ok(bind_address) = std::env::var("CALSYNC_BIND_ADDRESS") {
        config.server.bind_address = bind_address;
    }
    config.server.json_logs = env_bool("CALSYNC_JSON_LOGS", false);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `CalSyncError::Config` if the file is missing or malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CalSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CalSyncError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CalSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration by file extension (`.json` or `.toml`)
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CalSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CalSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CalSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe standard locations for a config file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["calsync.toml", "calsync.json", "config.toml", "config.json"];

    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| CalSyncError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional variable; unset yields `None`, garbage is an error.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CalSyncError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
