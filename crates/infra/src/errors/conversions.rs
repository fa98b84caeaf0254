//! Conversions from external infrastructure errors into domain errors.

use r2d2::Error as PoolError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use timekeep_domain::AttendanceError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub AttendanceError);

impl From<InfraError> for AttendanceError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AttendanceError> for InfraError {
    fn from(value: AttendanceError) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for InfraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for InfraError {}

/// Result of blocking storage closures; `?` lifts both driver and domain
/// errors.
pub type InfraResult<T> = std::result::Result<T, InfraError>;

trait IntoAttendanceError {
    fn into_attendance(self) -> AttendanceError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → AttendanceError */
/* -------------------------------------------------------------------------- */

impl IntoAttendanceError for SqlError {
    fn into_attendance(self) -> AttendanceError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked, _) => {
                        AttendanceError::TransientSync(format!("database is busy: {message}"))
                    }
                    // SQLITE_CONSTRAINT_UNIQUE and SQLITE_CONSTRAINT_PRIMARYKEY
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        AttendanceError::IntegrityConflict(format!(
                            "unique constraint violation: {message}"
                        ))
                    }
                    (ErrorCode::ConstraintViolation, 787) => AttendanceError::IntegrityConflict(
                        format!("foreign key constraint violation: {message}"),
                    ),
                    _ => AttendanceError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => AttendanceError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                AttendanceError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                AttendanceError::Database(format!("invalid column type {ty} for `{name}`"))
            }
            RE::InvalidPath(path) => AttendanceError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => AttendanceError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_attendance())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → AttendanceError */
/* -------------------------------------------------------------------------- */

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        // r2d2 only fails when no connection became available in time.
        Self(AttendanceError::TransientSync(format!("database pool exhausted: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AttendanceError */
/* -------------------------------------------------------------------------- */

impl IntoAttendanceError for HttpError {
    fn into_attendance(self) -> AttendanceError {
        if self.is_timeout() {
            return AttendanceError::TransientSync("HTTP request timed out".into());
        }

        if self.is_connect() {
            return AttendanceError::TransientSync("HTTP connection failure".into());
        }

        if self.is_decode() {
            return AttendanceError::TransientSync(format!("malformed device response: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => AttendanceError::NotFound(message),
                _ => AttendanceError::TransientSync(message),
            };
        }

        AttendanceError::TransientSync(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_attendance())
    }
}

/* -------------------------------------------------------------------------- */
/* sqlx::Error → AttendanceError */
/* -------------------------------------------------------------------------- */

#[cfg(feature = "checkinout-replica")]
impl IntoAttendanceError for sqlx::Error {
    fn into_attendance(self) -> AttendanceError {
        use sqlx::Error as XE;

        match self {
            XE::Io(_) | XE::PoolTimedOut | XE::PoolClosed | XE::Tls(_) => {
                AttendanceError::TransientSync(format!("checkinout replica unreachable: {self}"))
            }
            XE::Database(db) if db.is_unique_violation() => {
                AttendanceError::IntegrityConflict(db.message().to_string())
            }
            XE::RowNotFound => AttendanceError::NotFound("no rows returned by query".into()),
            XE::Configuration(cause) => {
                AttendanceError::Config(format!("invalid checkinout replica url: {cause}"))
            }
            other => AttendanceError::Database(other.to_string()),
        }
    }
}

#[cfg(feature = "checkinout-replica")]
impl From<sqlx::Error> for InfraError {
    fn from(value: sqlx::Error) -> Self {
        Self(value.into_attendance())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
