//! # Timekeep Core
//!
//! Attendance business logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Shift resolution and the timesheet lifecycle
//! - Punch ingestion and entry categorization
//! - Overtime generation and the claim workflow
//! - Device sync workers and typed background jobs
//! - Port interfaces (traits) implemented by `timekeep-infra`
//!
//! ## Architecture Principles
//! - Only depends on `timekeep-common` and `timekeep-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Side effects leave as explicit [`AttendanceEvent`](timekeep_domain::AttendanceEvent)s

pub mod clock;
pub mod devices;
pub mod events;
pub mod jobs;
pub mod overtime;
pub mod settings;
pub mod shift;
pub mod timesheet;

pub use clock::{trim_timestamps, ClockOutcome, ClockRequest, ClockService};
pub use devices::{
    AttendanceSource, DevicePushHandler, DeviceRepository, DeviceSyncService, InMemoryLeaseProvider,
    Lease, LeaseProvider, PushOutcome, RawEventRepository, SkipReason, SyncAllReport, SyncCounts,
    SyncReport,
};
pub use events::{dispatch, EventSink, TracingEventSink};
pub use jobs::{JobDispatcher, JobReport, JobStateRepository};
pub use overtime::{
    CompensatoryRules, EditOutcome, NoCompensatoryLeave, OvertimeOutcome, OvertimeRepository,
    OvertimeService, RecalibrationOutcome, SweepReport,
};
pub use settings::{DeviceSettings, EngineSettings};
pub use shift::{
    DayPlan, HolidayCalendar, IntervalIndex, NoHolidays, Resolution, ShiftRepository, ShiftResolver,
    TimingWindow,
};
pub use timesheet::{
    EnsureOutcome, PopulationReport, ScheduleChangeListener, TimesheetLifecycle, TimesheetRepository,
};
