//! Timesheets and their punch entries

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{
    AttendanceEvent, Coefficient, DeviceId, EntryCategory, EntryId, EntryMethod, EntryType,
    LeaveCoefficient, RemarkCategory, ShiftId, TimesheetId, TimingId, UserId,
};

/// Storage uniqueness key of a timesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimesheetKey {
    pub user: UserId,
    pub shift: Option<ShiftId>,
    pub timing: Option<TimingId>,
    pub date: NaiveDate,
}

/// Fields derived from the shift resolution and the leave overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleFields {
    pub expected_in: Option<DateTime<Utc>>,
    pub expected_out: Option<DateTime<Utc>>,
    pub coefficient: Coefficient,
    pub leave_coefficient: LeaveCoefficient,
    /// Grace copied from the shift at derivation time.
    pub start_grace_secs: i64,
    pub end_grace_secs: i64,
    /// Scheduled working minutes of the timing (0 without a timing).
    pub working_minutes: i64,
}

impl ScheduleFields {
    /// Fields of `next` that differ from `self`.
    pub fn diff(&self, next: &ScheduleFields) -> ChangedFields {
        let mut changed = ChangedFields::empty();
        if self.expected_in != next.expected_in {
            changed.insert(ChangedFields::EXPECTED_IN);
        }
        if self.expected_out != next.expected_out {
            changed.insert(ChangedFields::EXPECTED_OUT);
        }
        if self.coefficient != next.coefficient {
            changed.insert(ChangedFields::COEFFICIENT);
        }
        if self.leave_coefficient != next.leave_coefficient {
            changed.insert(ChangedFields::LEAVE_COEFFICIENT);
        }
        if self.start_grace_secs != next.start_grace_secs
            || self.end_grace_secs != next.end_grace_secs
        {
            changed.insert(ChangedFields::GRACE);
        }
        if self.working_minutes != next.working_minutes {
            changed.insert(ChangedFields::WORKING_MINUTES);
        }
        changed
    }
}

/// Set of schedule field names touched by a re-derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangedFields(u8);

impl ChangedFields {
    pub const EXPECTED_IN: Self = Self(1);
    pub const EXPECTED_OUT: Self = Self(1 << 1);
    pub const COEFFICIENT: Self = Self(1 << 2);
    pub const LEAVE_COEFFICIENT: Self = Self(1 << 3);
    pub const GRACE: Self = Self(1 << 4);
    pub const WORKING_MINUTES: Self = Self(1 << 5);

    const NAMES: [(Self, &'static str); 6] = [
        (Self::EXPECTED_IN, "expected_in"),
        (Self::EXPECTED_OUT, "expected_out"),
        (Self::COEFFICIENT, "coefficient"),
        (Self::LEAVE_COEFFICIENT, "leave_coefficient"),
        (Self::GRACE, "grace"),
        (Self::WORKING_MINUTES, "working_minutes"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Field names in declaration order, for audit logs.
    pub fn names(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

/// Fields recomputed from the entry set by categorization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub punch_in: Option<DateTime<Utc>>,
    pub punch_out: Option<DateTime<Utc>>,
    /// `actual - expected` in seconds; positive means later than expected.
    pub punch_in_delta_secs: Option<i64>,
    pub punch_out_delta_secs: Option<i64>,
    pub punctuality: Option<f64>,
    /// Punch-out minus punch-in minus unpaid breaks.
    pub worked_secs: Option<i64>,
    pub unpaid_break_secs: i64,
    pub is_present: bool,
}

/// Canonical per-user, per-work-period attendance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timesheet {
    pub id: TimesheetId,
    pub user: UserId,
    pub shift: Option<ShiftId>,
    pub timing: Option<TimingId>,
    pub date: NaiveDate,
    pub schedule: ScheduleFields,
    pub derived: DerivedFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timesheet {
    pub fn key(&self) -> TimesheetKey {
        TimesheetKey { user: self.user, shift: self.shift, timing: self.timing, date: self.date }
    }

    pub fn expected_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.schedule.expected_in.zip(self.schedule.expected_out)
    }

    /// True when `instant` lies within `[expected_in - padding, expected_out + padding]`.
    /// Sheets without an expected window own nothing by this test.
    pub fn window_admits(&self, instant: DateTime<Utc>, padding: Duration) -> bool {
        self.expected_window()
            .is_some_and(|(start, end)| instant >= start - padding && instant <= end + padding)
    }

    /// Offday, holiday and full-leave days are never penalized.
    pub fn is_non_working(&self) -> bool {
        self.schedule.coefficient != Coefficient::Workday || self.schedule.leave_coefficient.is_full()
    }

    pub fn worked(&self) -> Option<Duration> {
        self.derived.worked_secs.map(Duration::seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimesheet {
    pub user: UserId,
    pub shift: Option<ShiftId>,
    pub timing: Option<TimingId>,
    pub date: NaiveDate,
    pub schedule: ScheduleFields,
}

impl NewTimesheet {
    pub fn key(&self) -> TimesheetKey {
        TimesheetKey { user: self.user, shift: self.shift, timing: self.timing, date: self.date }
    }
}

/// One raw punch on a timesheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimesheetEntry {
    pub id: EntryId,
    pub timesheet: TimesheetId,
    pub timestamp: DateTime<Utc>,
    pub method: EntryMethod,
    pub entry_type: EntryType,
    pub category: EntryCategory,
    pub remark_category: Option<RemarkCategory>,
    pub remarks: Option<String>,
    pub source_device: Option<DeviceId>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimesheetEntry {
    pub timesheet: TimesheetId,
    pub timestamp: DateTime<Utc>,
    pub method: EntryMethod,
    pub entry_type: EntryType,
    pub category: EntryCategory,
    pub remark_category: Option<RemarkCategory>,
    pub remarks: Option<String>,
    pub source_device: Option<DeviceId>,
}

/// New type and category for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryClassification {
    pub entry: EntryId,
    pub entry_type: EntryType,
    pub category: EntryCategory,
}

/// Output of a categorization run, persisted in one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recategorization {
    pub timesheet: TimesheetId,
    pub derived: DerivedFields,
    pub entries: Vec<EntryClassification>,
    pub events: Vec<AttendanceEvent>,
}
