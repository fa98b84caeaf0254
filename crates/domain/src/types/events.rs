//! Outbound attendance events
//!
//! Returned explicitly by ingestion, categorization and the sweeps; callers
//! hand them to an event sink.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{ClaimId, DeviceId, TimesheetId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AttendanceEvent {
    LateIn { user: UserId, timesheet: TimesheetId, date: NaiveDate, punch: DateTime<Utc> },
    OvertimeGenerated { claim: ClaimId, user: UserId },
    OvertimeClaimExpired { claim: ClaimId, user: UserId },
    /// Organization-wide alert: the device stopped syncing.
    DeviceSyncFlagged { device: DeviceId, failed_count: u32 },
    UnmappedBioIds { device: DeviceId, bio_ids: Vec<String> },
}

impl AttendanceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LateIn { .. } => "late_in",
            Self::OvertimeGenerated { .. } => "overtime_generated",
            Self::OvertimeClaimExpired { .. } => "overtime_claim_expired",
            Self::DeviceSyncFlagged { .. } => "device_sync_flagged",
            Self::UnmappedBioIds { .. } => "unmapped_bio_ids",
        }
    }
}
