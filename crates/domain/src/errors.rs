//! Error types used throughout the engine

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use timekeep_common::error::{ErrorClassification, ErrorSeverity};

use crate::types::UserId;

/// Main error type for the attendance engine.
///
/// Overtime policy rejections are deliberately absent: they are normal
/// outcomes and travel inside `Ok(..)` as [`crate::PolicyRejection`].
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum AttendanceError {
    /// User input rejected; `field` names the offending input.
    #[error("Validation error on `{field}`: {message}")]
    Validation { field: String, message: String },

    #[error("No shift assigned to user {user} on {date}")]
    NoShiftAssigned { user: UserId, date: NaiveDate },

    /// Two assignments cover the same date. Requires an admin fix.
    #[error("Ambiguous shift assignment for user {user} on {date}")]
    AmbiguousShiftAssignment { user: UserId, date: NaiveDate },

    #[error("Transient sync error: {0}")]
    TransientSync(String),

    #[error("Integrity conflict: {0}")]
    IntegrityConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AttendanceError {
    /// Shorthand for a field-level validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Stable label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NoShiftAssigned { .. } => "no_shift_assigned",
            Self::AmbiguousShiftAssignment { .. } => "ambiguous_shift_assignment",
            Self::TransientSync(_) => "transient_sync",
            Self::IntegrityConflict(_) => "integrity_conflict",
            Self::NotFound(_) => "not_found",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

impl ErrorClassification for AttendanceError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientSync(_) | Self::Database(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound(_) | Self::NoShiftAssigned { .. } => ErrorSeverity::Info,
            Self::Validation { .. } | Self::TransientSync(_) | Self::IntegrityConflict(_) => {
                ErrorSeverity::Warning
            }
            Self::Database(_) | Self::Config(_) => ErrorSeverity::Error,
            Self::AmbiguousShiftAssignment { .. } | Self::Internal(_) => ErrorSeverity::Critical,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::TransientSync(_) => Some(Duration::from_secs(60)),
            _ => None,
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AttendanceError>;
