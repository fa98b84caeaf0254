//! Shared fixtures for the infra integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;
use timekeep_common::time::{Clock, MockClock};
use timekeep_domain::{Coefficient, LeaveCoefficient, NewTimesheet, ScheduleFields, UserId};
use timekeep_infra::database::DbManager;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    pub clock: Arc<MockClock>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Fresh database with the schema applied and a clock pinned to
    /// [`base_instant`].
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("timekeep-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("schema migrations should apply");

        Self {
            manager: Arc::new(manager),
            clock: Arc::new(MockClock::at(base_instant())),
            _temp_dir: temp_dir,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub fn base_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// Office-hours workday timesheet (09:00-18:00 UTC) without a shift.
pub fn workday_sheet(user: UserId, day: NaiveDate) -> NewTimesheet {
    NewTimesheet {
        user,
        shift: None,
        timing: None,
        date: day,
        schedule: ScheduleFields {
            expected_in: Some(day.and_hms_opt(9, 0, 0).unwrap().and_utc()),
            expected_out: Some(day.and_hms_opt(18, 0, 0).unwrap().and_utc()),
            coefficient: Coefficient::Workday,
            leave_coefficient: LeaveCoefficient::NoLeave,
            start_grace_secs: 600,
            end_grace_secs: 600,
            working_minutes: 540,
        },
    }
}
