//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Attempts to load from `TIMEKEEP_*` environment variables
//! 2. If `TIMEKEEP_DB_PATH` is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `TIMEKEEP_DB_PATH`: Database file path (required for env loading)
//! - `TIMEKEEP_DB_POOL_SIZE`: Connection pool size
//! - `TIMEKEEP_TIMEZONE`: IANA zone the shifts are written in
//! - `TIMEKEEP_DEVICE_API_KEY`: Shared secret for the push endpoint
//! - `TIMEKEEP_ADMS_ACCESS_KEY_1` / `TIMEKEEP_ADMS_ACCESS_KEY_2`: ADMS pull keys
//! - `TIMEKEEP_DEVICE_MAX_FAILURES`: Consecutive failures before a device is skipped
//! - `TIMEKEEP_CHECKINOUT_URL`: MySQL URL of the vendor replica
//! - `TIMEKEEP_BIND`: Listen address of the push server
//! - `TIMEKEEP_LOG_LEVEL` / `TIMEKEEP_LOG_FORMAT` / `TIMEKEEP_LOG_DIR`
//! - `TIMEKEEP_SCHEDULER_ENABLED`: Whether cron jobs run (true/false)
//!
//! Unset optional variables keep their [`Config::default`] values.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.{json,toml}` and `./timekeep.{json,toml}`
//! 2. `../config.{json,toml}` and `../../config.{json,toml}`
//! 3. The same names relative to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use timekeep_domain::{AttendanceError, Config, LogFormat, Result};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `AttendanceError::Config` if neither source yields a valid
/// configuration.
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
/// Returns `AttendanceError::Config` if `TIMEKEEP_DB_PATH` is missing or a
/// set variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("TIMEKEEP_DB_PATH")?;
    if let Some(pool_size) = env_parse::<u32>("TIMEKEEP_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }

    if let Some(timezone) = env_opt("TIMEKEEP_TIMEZONE") {
        config.engine.timezone = timezone;
    }

    config.devices.api_key = env_opt("TIMEKEEP_DEVICE_API_KEY");
    config.devices.access_key_1 = env_opt("TIMEKEEP_ADMS_ACCESS_KEY_1");
    config.devices.access_key_2 = env_opt("TIMEKEEP_ADMS_ACCESS_KEY_2");
    config.devices.checkinout_url = env_opt("TIMEKEEP_CHECKINOUT_URL");
    if let Some(max_failures) = env_parse::<u32>("TIMEKEEP_DEVICE_MAX_FAILURES")? {
        config.devices.max_failures = max_failures;
    }

    if let Some(bind) = env_opt("TIMEKEEP_BIND") {
        config.server.bind = bind;
    }

    if let Some(level) = env_opt("TIMEKEEP_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = env_opt("TIMEKEEP_LOG_FORMAT") {
        config.logging.format = parse_log_format(&format)?;
    }
    if let Some(directory) = env_opt("TIMEKEEP_LOG_DIR") {
        config.logging.directory = Some(directory);
    }

    config.scheduler.enabled = env_bool("TIMEKEEP_SCHEDULER_ENABLED", config.scheduler.enabled);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations via
/// [`probe_config_paths`]. Format is detected by file extension.
///
/// # Errors
/// Returns `AttendanceError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AttendanceError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AttendanceError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| AttendanceError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AttendanceError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AttendanceError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(AttendanceError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file
///
/// Returns the first file that exists, or `None`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| {
            [
                root.join("config.json"),
                root.join("config.toml"),
                root.join("timekeep.json"),
                root.join("timekeep.toml"),
                root.join("../config.json"),
                root.join("../config.toml"),
                root.join("../../config.json"),
                root.join("../../config.toml"),
            ]
        })
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        AttendanceError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Set and non-blank, trimmed.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| AttendanceError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn parse_log_format(raw: &str) -> Result<LogFormat> {
    match raw.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(AttendanceError::Config(format!("Unsupported log format: {other}"))),
    }
}
