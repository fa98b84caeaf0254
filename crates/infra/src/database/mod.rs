//! SQLite implementations of the core storage ports

mod codec;
pub mod coordination;
pub mod device_repository;
pub mod manager;
pub mod overtime_repository;
pub mod shift_repository;
pub mod timesheet_repository;

pub use coordination::{SqliteJobStateRepository, SqliteLeaseProvider};
pub use device_repository::{SqliteDeviceRepository, SqliteRawEventRepository};
pub use manager::{DbConnection, DbManager};
pub use overtime_repository::{SqliteCompensatoryRules, SqliteOvertimeRepository};
pub use shift_repository::{SqliteHolidayCalendar, SqliteShiftRepository};
pub use timesheet_repository::SqliteTimesheetRepository;
