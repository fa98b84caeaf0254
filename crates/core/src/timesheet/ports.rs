//! Port interfaces for timesheet storage

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use timekeep_domain::{
    EntryId, NewTimesheet, NewTimesheetEntry, Recategorization, Result, ScheduleFields, Timesheet,
    TimesheetEntry, TimesheetId, TimesheetKey, UserId,
};

/// Persistence for timesheets and their entries.
///
/// Implementations enforce uniqueness on [`TimesheetKey`] and report a
/// duplicate insert as `IntegrityConflict`.
#[async_trait]
pub trait TimesheetRepository: Send + Sync {
    async fn find(&self, id: TimesheetId) -> Result<Option<Timesheet>>;

    async fn find_by_key(&self, key: &TimesheetKey) -> Result<Option<Timesheet>>;

    /// All timesheets of `user` on any of `dates`.
    async fn find_for_user_dates(&self, user: UserId, dates: &[NaiveDate]) -> Result<Vec<Timesheet>>;

    async fn insert(&self, timesheet: NewTimesheet) -> Result<Timesheet>;

    async fn update_schedule(&self, id: TimesheetId, schedule: &ScheduleFields) -> Result<Timesheet>;

    /// Entries of a timesheet, soft-deleted ones included.
    async fn entries(&self, timesheet: TimesheetId) -> Result<Vec<TimesheetEntry>>;

    async fn insert_entry(&self, entry: NewTimesheetEntry) -> Result<TimesheetEntry>;

    async fn find_entry(&self, id: EntryId) -> Result<Option<TimesheetEntry>>;

    /// Returns false when the entry was already deleted.
    async fn soft_delete_entry(&self, id: EntryId) -> Result<bool>;

    /// Write derived fields and entry categories in one transaction.
    async fn apply_recategorization(&self, recategorization: &Recategorization) -> Result<()>;

    async fn modified_since(&self, since: DateTime<Utc>) -> Result<Vec<Timesheet>>;

    async fn for_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Timesheet>>;
}

/// Notified after a timesheet's schedule was re-derived.
#[async_trait]
pub trait ScheduleChangeListener: Send + Sync {
    async fn schedule_changed(&self, timesheet: &Timesheet) -> Result<()>;
}
