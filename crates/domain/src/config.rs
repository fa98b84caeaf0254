//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub devices: DeviceConfig,
    pub scheduler: SchedulerConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "timekeep.db".to_string(), pool_size: 8 }
    }
}

/// Attendance engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// IANA zone the organization's shifts are written in.
    pub timezone: String,
    pub dedup_tolerance_secs: i64,
    pub future_tolerance_secs: i64,
    /// Remark categories whose breaks are deducted from worked time.
    pub unpaid_break_categories: Vec<String>,
    pub offday_punchout_waiting_minutes: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            dedup_tolerance_secs: DEFAULT_DEDUP_TOLERANCE_SECS,
            future_tolerance_secs: DEFAULT_FUTURE_TOLERANCE_SECS,
            unpaid_break_categories: vec!["Personal Break".to_string()],
            offday_punchout_waiting_minutes: DEFAULT_OFFDAY_PUNCHOUT_WAITING_MINUTES,
        }
    }
}

/// Attendance device integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Shared secret expected in the push endpoint's `X-Api-Key` header.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(skip_serializing)]
    pub access_key_1: Option<String>,
    #[serde(skip_serializing)]
    pub access_key_2: Option<String>,
    pub lease_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub max_failures: u32,
    pub max_unmapped_attempts: u32,
    /// MySQL URL of the vendor `checkinout` replica.
    #[serde(skip_serializing)]
    pub checkinout_url: Option<String>,
    pub checkinout_timezone_offset_minutes: i64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            access_key_1: None,
            access_key_2: None,
            lease_ttl_secs: DEFAULT_DEVICE_LEASE_TTL_SECS,
            request_timeout_secs: DEFAULT_DEVICE_REQUEST_TIMEOUT_SECS,
            max_failures: DEFAULT_DEVICE_MAX_FAILURES,
            max_unmapped_attempts: DEFAULT_MAX_UNMAPPED_ATTEMPTS,
            checkinout_url: None,
            checkinout_timezone_offset_minutes: 0,
        }
    }
}

/// Cron expressions per job kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub populate_timesheets: String,
    pub daily_overtime_sweep: String,
    pub weekly_overtime_sweep: String,
    pub expire_overtime_claims: String,
    pub sync_devices: String,
    pub job_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            populate_timesheets: CRON_POPULATE_TIMESHEETS.to_string(),
            daily_overtime_sweep: CRON_DAILY_OVERTIME_SWEEP.to_string(),
            weekly_overtime_sweep: CRON_WEEKLY_OVERTIME_SWEEP.to_string(),
            expire_overtime_claims: CRON_EXPIRE_OVERTIME_CLAIMS.to_string(),
            sync_devices: CRON_SYNC_DEVICES.to_string(),
            job_timeout_secs: DEFAULT_JOB_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: DEFAULT_BIND_ADDRESS.to_string() }
    }
}

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
    /// Directory for daily-rolling log files. Stdout only when unset.
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty, directory: None }
    }
}
