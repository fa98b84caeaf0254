//! Clock ingestion
//!
//! Maps a raw punch to the timesheet that owns it, creating one when needed,
//! appends the entry and recategorizes the sheet. Punches for one user are
//! serialized through a keyed lock so two concurrent punches can never both
//! create a timesheet for the same work period.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use timekeep_common::sync::KeyedLocks;
use timekeep_common::time::Clock;
use timekeep_domain::{
    AttendanceError, AttendanceEvent, DeviceId, EntryCategory, EntryId, EntryMethod, EntryType,
    NewTimesheetEntry, Recategorization, RemarkCategory, Result, Timesheet, TimesheetEntry,
    TimesheetId, UserId,
};
use tracing::{debug, info, instrument};

use crate::settings::EngineSettings;
use crate::shift::ShiftResolver;
use crate::timesheet::{TimesheetLifecycle, TimesheetRepository};

/// One punch as it reaches the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockRequest {
    pub user: UserId,
    pub timestamp: DateTime<Utc>,
    pub method: EntryMethod,
    #[serde(default)]
    pub entry_type: Option<EntryType>,
    #[serde(default)]
    pub remark_category: Option<RemarkCategory>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub source_device: Option<DeviceId>,
}

impl ClockRequest {
    pub fn new(user: UserId, timestamp: DateTime<Utc>, method: EntryMethod) -> Self {
        Self {
            user,
            timestamp,
            method,
            entry_type: None,
            remark_category: None,
            remarks: None,
            source_device: None,
        }
    }

    pub fn with_remark(mut self, category: RemarkCategory, remarks: impl Into<String>) -> Self {
        self.remark_category = Some(category);
        self.remarks = Some(remarks.into());
        self
    }

    pub fn from_device(mut self, device: DeviceId) -> Self {
        self.source_device = Some(device);
        self
    }
}

/// Result of a punch. `events` must be handed to an
/// [`EventSink`](crate::events::EventSink) by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockOutcome {
    pub entry: TimesheetEntry,
    pub duplicate: bool,
    pub events: Vec<AttendanceEvent>,
}

pub struct ClockService {
    lifecycle: Arc<TimesheetLifecycle>,
    resolver: Arc<ShiftResolver>,
    repository: Arc<dyn TimesheetRepository>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks<UserId>>,
}

impl ClockService {
    pub fn new(
        lifecycle: Arc<TimesheetLifecycle>,
        resolver: Arc<ShiftResolver>,
        repository: Arc<dyn TimesheetRepository>,
        clock: Arc<dyn Clock>,
        locks: Arc<KeyedLocks<UserId>>,
    ) -> Self {
        Self { lifecycle, resolver, repository, clock, locks }
    }

    fn settings(&self) -> &EngineSettings {
        self.resolver.settings()
    }

    /// Punches closer than this to a kept one are near-duplicates.
    pub fn dedup_tolerance(&self) -> Duration {
        self.settings().dedup_tolerance
    }

    /// Attach a punch to its owning timesheet.
    #[instrument(skip(self, request), fields(user = request.user, timestamp = %request.timestamp))]
    pub async fn clock(&self, request: ClockRequest) -> Result<ClockOutcome> {
        self.validate_timestamp(request.timestamp)?;

        let _guard = self.locks.lock(request.user).await;
        let (sheet, rederived) = self.owning_timesheet(request.user, request.timestamp).await?;
        let mut outcome = self.append(&sheet, request).await?;
        if !rederived.is_empty() {
            outcome.events.splice(0..0, rederived);
        }
        Ok(outcome)
    }

    /// Attach a punch to an explicit timesheet, as adjustments do.
    #[instrument(skip(self, request), fields(user = request.user, timestamp = %request.timestamp))]
    pub async fn clock_into(&self, timesheet: TimesheetId, request: ClockRequest) -> Result<ClockOutcome> {
        self.validate_timestamp(request.timestamp)?;

        let _guard = self.locks.lock(request.user).await;
        let sheet = self
            .repository
            .find(timesheet)
            .await?
            .ok_or_else(|| AttendanceError::validation("timesheet", format!("timesheet {timesheet} does not exist")))?;
        if sheet.user != request.user {
            return Err(AttendanceError::validation(
                "timesheet",
                format!("timesheet {timesheet} does not belong to user {}", request.user),
            ));
        }
        self.append(&sheet, request).await
    }

    /// Soft-delete an entry and recategorize its timesheet.
    #[instrument(skip(self))]
    pub async fn soft_delete_entry(&self, id: EntryId) -> Result<Recategorization> {
        let entry = self
            .repository
            .find_entry(id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("timesheet entry {id}")))?;
        let sheet = self
            .repository
            .find(entry.timesheet)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("timesheet {}", entry.timesheet)))?;

        let _guard = self.locks.lock(sheet.user).await;
        if self.repository.soft_delete_entry(id).await? {
            info!(entry = id, timesheet = sheet.id, "clock.entry_deleted");
        }
        self.lifecycle.recategorize(&sheet).await
    }

    fn validate_timestamp(&self, timestamp: DateTime<Utc>) -> Result<()> {
        let limit = self.clock.now() + self.settings().future_tolerance;
        if timestamp > limit {
            return Err(AttendanceError::validation(
                "timestamp",
                format!("punch at {timestamp} is in the future"),
            ));
        }
        Ok(())
    }

    /// The sheet of the window governing `instant`, or the local date's sheet
    /// when no window does, plus any events raised while re-deriving it.
    async fn owning_timesheet(
        &self,
        user: UserId,
        instant: DateTime<Utc>,
    ) -> Result<(Timesheet, Vec<AttendanceEvent>)> {
        let padding = self.settings().punch_window_padding;

        if let Some(window) = self.resolver.timing_for_instant(user, instant).await? {
            let existing = self.repository.find_for_user_dates(user, &[window.date]).await?;
            if let Some(sheet) = existing
                .into_iter()
                .find(|sheet| sheet.timing == Some(window.timing.id) && sheet.window_admits(instant, padding))
            {
                return Ok((sheet, Vec::new()));
            }

            let outcomes = self.lifecycle.ensure_timesheets(user, window.date).await?;
            let events: Vec<AttendanceEvent> =
                outcomes.iter().flat_map(|outcome| outcome.events.iter().cloned()).collect();
            if let Some(outcome) = outcomes
                .into_iter()
                .find(|outcome| outcome.timesheet.timing == Some(window.timing.id))
            {
                return Ok((outcome.timesheet, events));
            }
        }

        let local_date = self.settings().local_date(instant);
        let outcomes = self.lifecycle.ensure_timesheets(user, local_date).await?;
        let events = outcomes.iter().flat_map(|outcome| outcome.events.iter().cloned()).collect();
        let sheet = outcomes
            .into_iter()
            .next()
            .ok_or_else(|| AttendanceError::Internal(format!("no timesheet derived for {user} on {local_date}")))?;
        Ok((sheet.timesheet, events))
    }

    async fn append(&self, sheet: &Timesheet, request: ClockRequest) -> Result<ClockOutcome> {
        let timestamp = request.timestamp.trunc_subsecs(0);
        let entries = self.repository.entries(sheet.id).await?;
        if let Some(existing) = self.find_duplicate(&entries, timestamp, &request) {
            debug!(timesheet = sheet.id, entry = existing.id, "clock.duplicate");
            return Ok(ClockOutcome { entry: existing.clone(), duplicate: true, events: Vec::new() });
        }

        let entry = self
            .repository
            .insert_entry(NewTimesheetEntry {
                timesheet: sheet.id,
                timestamp,
                method: request.method,
                entry_type: request.entry_type.unwrap_or(EntryType::Unknown),
                category: EntryCategory::Uncategorized,
                remark_category: request.remark_category,
                remarks: request.remarks,
                source_device: request.source_device,
            })
            .await?;
        info!(timesheet = sheet.id, entry = entry.id, method = %entry.method, "clock.entry_added");

        let recategorization = self.lifecycle.recategorize(sheet).await?;
        let entry = self.repository.find_entry(entry.id).await?.unwrap_or(entry);
        Ok(ClockOutcome { entry, duplicate: false, events: recategorization.events })
    }

    /// Same second from any source, or within the tolerance from the same
    /// method and device.
    fn find_duplicate<'a>(
        &self,
        entries: &'a [TimesheetEntry],
        timestamp: DateTime<Utc>,
        request: &ClockRequest,
    ) -> Option<&'a TimesheetEntry> {
        let tolerance = self.settings().dedup_tolerance;
        entries.iter().filter(|entry| !entry.is_deleted).find(|entry| {
            let existing = entry.timestamp.trunc_subsecs(0);
            existing == timestamp
                || ((existing - timestamp).abs() <= tolerance
                    && entry.method == request.method
                    && entry.source_device == request.source_device)
        })
    }
}
