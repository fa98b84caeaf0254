//! Timesheet lifecycle
//!
//! Creates or re-derives exactly one timesheet per user, timing and date.
//! Re-derivation only touches the schedule fields whose inputs changed and
//! keeps leave overlays unless the leave collaborator itself writes them.

use std::sync::Arc;

use chrono::NaiveDate;
use timekeep_common::sync::KeyedLocks;
use timekeep_common::time::Clock;
use timekeep_domain::{
    AttendanceError, AttendanceEvent, ChangedFields, LeaveCoefficient, NewTimesheet, Recategorization,
    Result, ScheduleFields, Timesheet, TimesheetId, TimesheetKey, UserId, WorkTiming,
};
use tracing::{debug, info, instrument, warn};

use super::categorize::{self, CategorizeContext};
use super::ports::{ScheduleChangeListener, TimesheetRepository};
use crate::events::{dispatch, EventSink};
use crate::shift::{DayPlan, ShiftRepository, ShiftResolver};

/// Result of ensuring one timesheet.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsureOutcome {
    pub timesheet: Timesheet,
    pub created: bool,
    pub changed: ChangedFields,
    /// Raised by recategorizing a re-derived sheet.
    pub events: Vec<AttendanceEvent>,
}

impl EnsureOutcome {
    fn unchanged(timesheet: Timesheet) -> Self {
        Self { timesheet, created: false, changed: ChangedFields::empty(), events: Vec::new() }
    }
}

/// Counts from a daily population run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulationReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub users: usize,
}

/// Where the leave coefficient of a re-derived sheet comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeaveOverlay {
    Keep,
    Authority(LeaveCoefficient),
}

pub struct TimesheetLifecycle {
    resolver: Arc<ShiftResolver>,
    repository: Arc<dyn TimesheetRepository>,
    shifts: Arc<dyn ShiftRepository>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks<UserId>>,
    listener: Option<Arc<dyn ScheduleChangeListener>>,
    events: Option<Arc<dyn EventSink>>,
}

impl TimesheetLifecycle {
    pub fn new(
        resolver: Arc<ShiftResolver>,
        repository: Arc<dyn TimesheetRepository>,
        shifts: Arc<dyn ShiftRepository>,
        clock: Arc<dyn Clock>,
        locks: Arc<KeyedLocks<UserId>>,
    ) -> Self {
        Self { resolver, repository, shifts, clock, locks, listener: None, events: None }
    }

    /// Notify `listener` when population or a leave overlay changes a sheet.
    pub fn with_listener(mut self, listener: Arc<dyn ScheduleChangeListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Deliver events raised by population and leave overlays to `sink`.
    /// Callers of [`Self::ensure_timesheets`] dispatch the outcome events
    /// themselves.
    pub fn with_events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn resolver(&self) -> &ShiftResolver {
        &self.resolver
    }

    /// Ensure the timesheet of the first timing on `date`.
    pub async fn ensure_timesheet(&self, user: UserId, date: NaiveDate) -> Result<EnsureOutcome> {
        self.ensure_timesheets(user, date)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AttendanceError::Internal(format!("no timesheet derived for {user} on {date}")))
    }

    /// Ensure one timesheet per timing on `date` (a single one on offdays).
    ///
    /// Callers serialize per user; see [`crate::clock::ClockService`].
    #[instrument(skip(self))]
    pub async fn ensure_timesheets(&self, user: UserId, date: NaiveDate) -> Result<Vec<EnsureOutcome>> {
        self.rederive(user, date, LeaveOverlay::Keep).await
    }

    /// Leave collaborator entry point: overwrite the leave coefficient of the
    /// day's sheets, then recategorize and notify the listener.
    #[instrument(skip(self))]
    pub async fn apply_leave(
        &self,
        user: UserId,
        date: NaiveDate,
        leave: LeaveCoefficient,
    ) -> Result<Vec<EnsureOutcome>> {
        let outcomes = {
            let _guard = self.locks.lock(user).await;
            self.rederive(user, date, LeaveOverlay::Authority(leave)).await?
        };
        self.publish(&outcomes).await;
        self.notify_changed(&outcomes).await;
        Ok(outcomes)
    }

    /// Daily population: ensure timesheets for every user assigned on `date`.
    /// One user's failure never aborts the others.
    #[instrument(skip(self))]
    pub async fn populate(&self, date: NaiveDate) -> Result<PopulationReport> {
        let users = self.shifts.users_with_assignment_on(date).await?;
        let mut report = PopulationReport { users: users.len(), ..PopulationReport::default() };

        for user in users {
            let result = {
                let _guard = self.locks.lock(user).await;
                self.ensure_timesheets(user, date).await
            };
            match result {
                Ok(outcomes) => {
                    for outcome in &outcomes {
                        if outcome.created {
                            report.created += 1;
                        } else if outcome.changed.is_empty() {
                            report.unchanged += 1;
                        } else {
                            report.updated += 1;
                        }
                    }
                    self.publish(&outcomes).await;
                    self.notify_changed(&outcomes).await;
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(user, %date, error = %err, kind = err.label(), "timesheet.populate_failed");
                }
            }
        }

        info!(
            %date,
            users = report.users,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "timesheet.populated"
        );
        Ok(report)
    }

    /// Re-derive categories, punctuality and worked time and persist them in
    /// one transaction.
    pub async fn recategorize(&self, sheet: &Timesheet) -> Result<Recategorization> {
        let entries = self.repository.entries(sheet.id).await?;
        let settings = self.resolver.settings();
        let ctx = CategorizeContext {
            today: settings.local_date(self.clock.now()),
            unpaid_break_categories: &settings.unpaid_break_categories,
        };
        let recategorization = categorize::recategorize(sheet, &entries, ctx);
        self.repository.apply_recategorization(&recategorization).await?;
        debug!(
            timesheet = sheet.id,
            entries = recategorization.entries.len(),
            punctuality = ?recategorization.derived.punctuality,
            "timesheet.recategorized"
        );
        Ok(recategorization)
    }

    pub async fn recategorize_by_id(&self, id: TimesheetId) -> Result<Recategorization> {
        let sheet = self
            .repository
            .find(id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("timesheet {id}")))?;
        self.recategorize(&sheet).await
    }

    async fn rederive(&self, user: UserId, date: NaiveDate, overlay: LeaveOverlay) -> Result<Vec<EnsureOutcome>> {
        let plan = match self.resolver.day_plan(user, date).await {
            Ok(plan) => plan,
            // Unassigned users still get a timing-less workday sheet.
            Err(AttendanceError::NoShiftAssigned { .. }) => {
                debug!(user, %date, "timesheet.unassigned_user");
                DayPlan::unscheduled(user, date)
            }
            Err(err) => return Err(err),
        };
        let existing = self.repository.find_for_user_dates(user, &[date]).await?;
        // Leave belongs to the day, so it survives a shift or timing change.
        let day_leave = existing.first().map(|sheet| sheet.schedule.leave_coefficient);

        let timings: Vec<Option<&WorkTiming>> = if plan.timings.is_empty() {
            vec![None]
        } else {
            plan.timings.iter().map(Some).collect()
        };

        let mut outcomes = Vec::with_capacity(timings.len());
        for timing in timings {
            let key = TimesheetKey { user, shift: plan.shift_id(), timing: timing.map(|t| t.id), date };
            let current = existing.iter().find(|sheet| sheet.key() == key);
            let leave = match overlay {
                LeaveOverlay::Authority(leave) => leave,
                LeaveOverlay::Keep => current
                    .map(|sheet| sheet.schedule.leave_coefficient)
                    .or(day_leave)
                    .unwrap_or_default(),
            };
            let schedule = self.schedule_for(&plan, timing, leave);

            let outcome = match current {
                Some(sheet) => self.update_if_changed(sheet, schedule).await?,
                None => self.create(key, schedule).await?,
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn schedule_for(&self, plan: &DayPlan, timing: Option<&WorkTiming>, leave: LeaveCoefficient) -> ScheduleFields {
        let window = timing.map(|timing| self.resolver.window(plan.date, timing));
        let shift = plan.shift();
        ScheduleFields {
            expected_in: window.as_ref().map(|w| w.start),
            expected_out: window.as_ref().map(|w| w.end),
            coefficient: plan.coefficient,
            leave_coefficient: leave,
            start_grace_secs: shift.map_or(0, |s| s.start_time_grace_secs),
            end_grace_secs: shift.map_or(0, |s| s.end_time_grace_secs),
            working_minutes: timing.map_or(0, |t| t.working_minutes),
        }
    }

    async fn create(&self, key: TimesheetKey, schedule: ScheduleFields) -> Result<EnsureOutcome> {
        let new = NewTimesheet { user: key.user, shift: key.shift, timing: key.timing, date: key.date, schedule };
        match self.repository.insert(new.clone()).await {
            Ok(timesheet) => {
                info!(
                    timesheet = timesheet.id,
                    user = key.user,
                    date = %key.date,
                    coefficient = %timesheet.schedule.coefficient,
                    "timesheet.created"
                );
                Ok(EnsureOutcome { timesheet, created: true, changed: ChangedFields::empty(), events: Vec::new() })
            }
            Err(AttendanceError::IntegrityConflict(reason)) => {
                debug!(user = key.user, date = %key.date, %reason, "timesheet.insert_conflict");
                let existing = self.repository.find_by_key(&key).await?.ok_or_else(|| {
                    AttendanceError::IntegrityConflict(format!("{reason}; conflicting row not found"))
                })?;
                self.update_if_changed(&existing, new.schedule).await
            }
            Err(err) => Err(err),
        }
    }

    async fn update_if_changed(&self, sheet: &Timesheet, schedule: ScheduleFields) -> Result<EnsureOutcome> {
        let changed = sheet.schedule.diff(&schedule);
        if changed.is_empty() {
            return Ok(EnsureOutcome::unchanged(sheet.clone()));
        }

        let updated = self.repository.update_schedule(sheet.id, &schedule).await?;
        info!(timesheet = sheet.id, changed = ?changed.names(), "timesheet.rederived");
        let recategorization = self.recategorize(&updated).await?;

        let refreshed = self.repository.find(sheet.id).await?.unwrap_or(updated);
        Ok(EnsureOutcome { timesheet: refreshed, created: false, changed, events: recategorization.events })
    }

    async fn publish(&self, outcomes: &[EnsureOutcome]) {
        let Some(sink) = &self.events else {
            return;
        };
        for outcome in outcomes {
            dispatch(sink.as_ref(), &outcome.events).await;
        }
    }

    async fn notify_changed(&self, outcomes: &[EnsureOutcome]) {
        let Some(listener) = &self.listener else {
            return;
        };
        for outcome in outcomes.iter().filter(|outcome| !outcome.changed.is_empty()) {
            if let Err(err) = listener.schedule_changed(&outcome.timesheet).await {
                warn!(timesheet = outcome.timesheet.id, error = %err, "timesheet.listener_failed");
            }
        }
    }
}
