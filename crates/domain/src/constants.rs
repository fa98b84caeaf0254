//! Engine constants
//!
//! Centralized defaults used when configuration leaves a knob unset.

// Clock ingestion
pub const DEFAULT_DEDUP_TOLERANCE_SECS: i64 = 1;
pub const DEFAULT_FUTURE_TOLERANCE_SECS: i64 = 60;
/// Padding around an expected window inside which a timesheet may own a punch.
pub const PUNCH_WINDOW_PADDING_HOURS: i64 = 24;
/// How long after the previous shift ends an offday punch still counts as its
/// punch-out.
pub const DEFAULT_OFFDAY_PUNCHOUT_WAITING_MINUTES: i64 = 360;
pub const DEFAULT_TIMEZONE: &str = "UTC";

// Device sync
pub const DEVICE_SYNC_LEASE_PREFIX: &str = "syncing_device_";
pub const DEFAULT_DEVICE_LEASE_TTL_SECS: u64 = 720;
pub const DEFAULT_DEVICE_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DEVICE_MAX_FAILURES: u32 = 100;
pub const DEFAULT_MAX_UNMAPPED_ATTEMPTS: u32 = 10;
pub const ADMS_LOGS_PATH: &str = "/api/logs";

// Overtime
pub const OVERTIME_GENERATED_REMARK: &str = "Overtime Generated by the System.";
pub const OVERTIME_RECALIBRATED_REMARK: &str = "Overtime Re-Calibrated by the System.";
pub const OVERTIME_EXPIRED_REMARK: &str = "Overtime claim expired.";
pub const OVERTIME_EDITED_REMARK: &str = "Claimed overtime edited.";

// Scheduler defaults (six-field cron, seconds first)
pub const CRON_POPULATE_TIMESHEETS: &str = "0 5 0 * * *";
pub const CRON_DAILY_OVERTIME_SWEEP: &str = "0 0 2 * * *";
pub const CRON_WEEKLY_OVERTIME_SWEEP: &str = "0 0 3 * * Mon";
pub const CRON_EXPIRE_OVERTIME_CLAIMS: &str = "0 0 1 * * *";
pub const CRON_SYNC_DEVICES: &str = "0 */5 * * * *";
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 900;

// Server
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8088";
pub const DEVICE_PUSH_ROUTE: &str = "/api/v1/attendance/device-push";
pub const API_KEY_HEADER: &str = "x-api-key";
