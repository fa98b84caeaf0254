//! Scheduler error types

use std::time::Duration;

use thiserror::Error;
use timekeep_domain::AttendanceError;
use tokio::task::JoinError;
use tokio_cron_scheduler::JobSchedulerError;

use crate::errors::InfraError;

/// Scheduler lifecycle errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error("Scheduler not running")]
    NotRunning,

    #[error("Failed to create scheduler: {source}")]
    CreationFailed {
        #[source]
        source: JobSchedulerError,
    },

    #[error("Failed to start scheduler: {source}")]
    StartFailed {
        #[source]
        source: JobSchedulerError,
    },

    #[error("Failed to stop scheduler: {source}")]
    StopFailed {
        #[source]
        source: JobSchedulerError,
    },

    /// A cron expression was rejected or the job could not be added.
    #[error("Failed to register job `{job}`: {source}")]
    JobRegistrationFailed {
        job: &'static str,
        #[source]
        source: JobSchedulerError,
    },

    #[error("Operation timed out after {}s", duration.as_secs())]
    Timeout { duration: Duration },

    #[error("Task join failed: {source}")]
    TaskJoinFailed {
        #[source]
        source: JoinError,
    },
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let attendance = match err {
            SchedulerError::JobRegistrationFailed { .. } => AttendanceError::Config(err.to_string()),
            _ => AttendanceError::Internal(err.to_string()),
        };
        InfraError(attendance)
    }
}

impl From<SchedulerError> for AttendanceError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
