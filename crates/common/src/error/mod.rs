//! Error classification shared by every Timekeep error type.
//!
//! Layer-specific errors (`AttendanceError`, `SchedulerError`, ...) stay in
//! their own crates. What they share is the *shape* of classification: is the
//! failure worth retrying on the next scheduled run, and how loudly should it
//! be reported.
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Resource not found |
//! | **Warning** | Degraded but operational | Field validation, device unreachable |
//! | **Error** | Failure requiring attention | Database errors, bad config |
//! | **Critical** | Data integrity at risk | Overlapping shift assignments |

use std::fmt;
use std::time::Duration;

/// Standard interface for classifying errors by their characteristics.
pub trait ErrorClassification {
    /// Check if this error is retryable.
    ///
    /// Background jobs use this to decide between "log and try next cycle"
    /// and "needs an operator".
    fn is_retryable(&self) -> bool;

    /// Get the error severity level.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention.
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Suggested retry delay, if the failure carries one.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
