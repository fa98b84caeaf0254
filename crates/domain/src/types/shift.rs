//! Shift definitions, assignments and roster overrides

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::{OrganizationId, ShiftId, TimingId, UserId};
use crate::errors::{AttendanceError, Result};

/// Inclusive date range. `to = None` is open ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: Option<NaiveDate>) -> Result<Self> {
        if let Some(to) = to {
            if to < from {
                return Err(AttendanceError::validation(
                    "applicable_to",
                    format!("{to} is before applicable_from {from}"),
                ));
            }
        }
        Ok(Self { from, to })
    }

    pub const fn open(from: NaiveDate) -> Self {
        Self { from, to: None }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && self.to.map_or(true, |to| date <= to)
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        let starts_before_other_ends = other.to.map_or(true, |to| self.from <= to);
        let other_starts_before_end = self.to.map_or(true, |to| other.from <= to);
        starts_before_other_ends && other_starts_before_end
    }

    pub const fn is_open_ended(&self) -> bool {
        self.to.is_none()
    }
}

/// A start/end window on one work day. `extends` marks overnight windows
/// whose end falls on the following calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkTiming {
    pub id: TimingId,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub extends: bool,
    pub working_minutes: i64,
}

impl WorkTiming {
    pub fn validate(&self) -> Result<()> {
        if !self.extends && self.end_time <= self.start_time {
            return Err(AttendanceError::validation(
                "end_time",
                "end time must be after start time unless the timing extends overnight",
            ));
        }
        if self.extends && self.end_time > self.start_time {
            return Err(AttendanceError::validation(
                "extends",
                "an overnight timing must end before it starts on the clock",
            ));
        }
        Ok(())
    }

    /// Naive local start and end of this timing when worked on `date`.
    pub fn local_bounds(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let start = date.and_time(self.start_time);
        let end_date = if self.extends { date + Duration::days(1) } else { date };
        (start, end_date.and_time(self.end_time))
    }
}

/// Timing rules for one weekday, valid over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDay {
    pub day: Weekday,
    pub validity: DateRange,
    pub timings: Vec<WorkTiming>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDefinition {
    pub id: ShiftId,
    pub organization: OrganizationId,
    pub name: String,
    pub start_time_grace_secs: i64,
    pub end_time_grace_secs: i64,
    pub work_days: Vec<WorkDay>,
}

impl ShiftDefinition {
    pub fn start_grace(&self) -> Duration {
        Duration::seconds(self.start_time_grace_secs)
    }

    pub fn end_grace(&self) -> Duration {
        Duration::seconds(self.end_time_grace_secs)
    }

    /// Work days defined for `weekday`, in any validity range.
    pub fn work_days_for(&self, weekday: Weekday) -> impl Iterator<Item = &WorkDay> {
        self.work_days.iter().filter(move |day| day.day == weekday)
    }

    /// Checks timings and the one-open-range-per-weekday rule.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AttendanceError::validation("name", "shift name is required"));
        }
        if self.start_time_grace_secs < 0 || self.end_time_grace_secs < 0 {
            return Err(AttendanceError::validation("grace", "grace periods cannot be negative"));
        }

        for day in &self.work_days {
            for timing in &day.timings {
                timing.validate()?;
            }
        }

        for (index, day) in self.work_days.iter().enumerate() {
            let clash = self.work_days[index + 1..]
                .iter()
                .any(|other| other.day == day.day && other.validity.overlaps(&day.validity));
            if clash {
                return Err(AttendanceError::validation(
                    "work_days",
                    format!("overlapping validity for {} in shift {}", day.day, self.name),
                ));
            }
        }
        Ok(())
    }
}

/// What a user is bound to over a validity range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "shift", rename_all = "snake_case")]
pub enum AssignmentTarget {
    Shift(ShiftId),
    /// Hourly employees without a fixed timing.
    WorkingHours,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftAssignment {
    pub id: i64,
    pub user: UserId,
    pub target: AssignmentTarget,
    pub validity: DateRange,
}

/// Per-date replacement of a user's shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterOverride {
    pub user: UserId,
    pub date: NaiveDate,
    pub shift: ShiftId,
}
