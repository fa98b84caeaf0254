//! Typed background job descriptors

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::TimesheetId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Create the day's timesheets for every active user. `None` means today.
    PopulateTimesheets { date: Option<NaiveDate> },
    DailyOvertimeSweep,
    /// Generate overtime for the ISO week holding `week_of`, defaulting to last week.
    WeeklyOvertimeSweep { week_of: Option<NaiveDate> },
    FixMissingOvertime { ids: Vec<TimesheetId> },
    ExpireOvertimeClaims,
    SyncDevices,
}

impl JobKind {
    /// Stable name used for overlap flags, watermarks and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PopulateTimesheets { .. } => "populate_timesheets",
            Self::DailyOvertimeSweep => "daily_overtime_sweep",
            Self::WeeklyOvertimeSweep { .. } => "weekly_overtime_sweep",
            Self::FixMissingOvertime { .. } => "fix_missing_overtime",
            Self::ExpireOvertimeClaims => "expire_overtime_claims",
            Self::SyncDevices => "sync_devices",
        }
    }
}
