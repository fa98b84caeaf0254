//! Runtime engine settings parsed from configuration

use std::collections::HashSet;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use timekeep_domain::constants::PUNCH_WINDOW_PADDING_HOURS;
use timekeep_domain::{AttendanceError, DeviceConfig, EngineConfig, RemarkCategory, Result};

/// Validated engine knobs shared by the services.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub timezone: Tz,
    pub dedup_tolerance: Duration,
    pub future_tolerance: Duration,
    pub unpaid_break_categories: HashSet<RemarkCategory>,
    pub offday_punchout_waiting: Duration,
    pub punch_window_padding: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let timezone: Tz = config.timezone.parse().map_err(|_| {
            AttendanceError::Config(format!("unknown timezone `{}`", config.timezone))
        })?;

        let unpaid_break_categories = config
            .unpaid_break_categories
            .iter()
            .map(|label| {
                label.parse::<RemarkCategory>().map_err(AttendanceError::Config)
            })
            .collect::<Result<HashSet<_>>>()?;

        if config.dedup_tolerance_secs < 0 || config.future_tolerance_secs < 0 {
            return Err(AttendanceError::Config("tolerances cannot be negative".into()));
        }

        Ok(Self {
            timezone,
            dedup_tolerance: Duration::seconds(config.dedup_tolerance_secs),
            future_tolerance: Duration::seconds(config.future_tolerance_secs),
            unpaid_break_categories,
            offday_punchout_waiting: Duration::minutes(config.offday_punchout_waiting_minutes),
            punch_window_padding: Duration::hours(PUNCH_WINDOW_PADDING_HOURS),
        })
    }

    /// Calendar date of `instant` in the organization's zone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    /// Interpret a naive local time in the organization's zone.
    ///
    /// Ambiguous times (DST fall-back) take the earlier instant. Times inside
    /// a spring-forward gap are pushed past the gap.
    pub fn localize(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self.timezone.from_local_datetime(&local) {
            LocalResult::Single(at) => at.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => {
                let shifted = local + Duration::hours(1);
                self.timezone
                    .from_local_datetime(&shifted)
                    .earliest()
                    .map_or_else(|| Utc.from_utc_datetime(&local), |at| at.with_timezone(&Utc))
            }
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            dedup_tolerance: Duration::seconds(timekeep_domain::constants::DEFAULT_DEDUP_TOLERANCE_SECS),
            future_tolerance: Duration::seconds(
                timekeep_domain::constants::DEFAULT_FUTURE_TOLERANCE_SECS,
            ),
            unpaid_break_categories: HashSet::from([RemarkCategory::PersonalBreak]),
            offday_punchout_waiting: Duration::minutes(
                timekeep_domain::constants::DEFAULT_OFFDAY_PUNCHOUT_WAITING_MINUTES,
            ),
            punch_window_padding: Duration::hours(PUNCH_WINDOW_PADDING_HOURS),
        }
    }
}

/// Device sync knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    pub lease_ttl: StdDuration,
    pub request_timeout: StdDuration,
    pub max_failures: u32,
    pub max_unmapped_attempts: u32,
}

impl From<&DeviceConfig> for DeviceSettings {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            lease_ttl: StdDuration::from_secs(config.lease_ttl_secs),
            request_timeout: StdDuration::from_secs(config.request_timeout_secs),
            max_failures: config.max_failures,
            max_unmapped_attempts: config.max_unmapped_attempts,
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self::from(&DeviceConfig::default())
    }
}
