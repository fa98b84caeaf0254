//! Cron scheduling for the background attendance jobs
//!
//! - Timesheet population, overtime sweeps and claim expiry
//! - Device sync across every registered device
//!
//! Start and stop are wrapped in timeouts, spawned work is tracked, and a
//! cancellation token ends the monitor task.

pub mod error;
pub mod job_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use job_scheduler::{AttendanceScheduler, JobRunner, SchedulerTimeouts};
