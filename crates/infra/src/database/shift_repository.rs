//! SQLite-backed shift, assignment, roster and holiday storage.
//!
//! Implements the read ports used by the shift resolver plus the admin
//! writes that maintain them. A shift is stored across three tables
//! (`shifts`, `shift_work_days`, `shift_timings`) and rebuilt on read.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use timekeep_core::{HolidayCalendar, ShiftRepository};
use timekeep_domain::{
    AssignmentTarget, AttendanceError, DateRange, Result, RosterOverride, ShiftAssignment,
    ShiftDefinition, ShiftId, UserId, WorkDay, WorkTiming,
};
use tracing::debug;

use super::codec::{clock_time, date_at, date_opt, day, time_at};
use super::manager::DbManager;
use crate::errors::InfraResult;

pub struct SqliteShiftRepository {
    db: Arc<DbManager>,
}

impl SqliteShiftRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert or replace a shift with all of its work days and timings.
    /// Shift names are unique per organization.
    pub async fn save_shift(&self, shift: &ShiftDefinition) -> Result<()> {
        shift.validate()?;
        let shift = shift.clone();

        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                tx.execute(
                    "INSERT INTO shifts (id, organization_id, name, start_time_grace_secs, end_time_grace_secs)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                        organization_id = excluded.organization_id,
                        name = excluded.name,
                        start_time_grace_secs = excluded.start_time_grace_secs,
                        end_time_grace_secs = excluded.end_time_grace_secs",
                    params![
                        shift.id,
                        shift.organization,
                        shift.name,
                        shift.start_time_grace_secs,
                        shift.end_time_grace_secs
                    ],
                )?;
                tx.execute("DELETE FROM shift_work_days WHERE shift_id = ?1", params![shift.id])?;

                for work_day in &shift.work_days {
                    tx.execute(
                        "INSERT INTO shift_work_days (shift_id, weekday, applicable_from, applicable_to)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![
                            shift.id,
                            work_day.day.num_days_from_monday(),
                            day(work_day.validity.from),
                            work_day.validity.to.map(day)
                        ],
                    )?;
                    let work_day_id = tx.last_insert_rowid();
                    for timing in &work_day.timings {
                        tx.execute(
                            "INSERT INTO shift_timings (id, work_day_id, start_time, end_time, extends, working_minutes)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                            params![
                                timing.id,
                                work_day_id,
                                clock_time(timing.start_time),
                                clock_time(timing.end_time),
                                timing.extends,
                                timing.working_minutes
                            ],
                        )?;
                    }
                }
                tx.commit()?;
                debug!(shift = shift.id, work_days = shift.work_days.len(), "shift.saved");
                Ok(())
            })
            .await
    }

    /// Store an assignment row. A user may not hold two assignments whose
    /// validity ranges overlap; re-saving the same id replaces it.
    pub async fn save_assignment(&self, assignment: &ShiftAssignment) -> Result<()> {
        let assignment = assignment.clone();
        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let existing = {
                    let mut stmt = tx.prepare(
                        "SELECT id, user_id, shift_id, applicable_from, applicable_to
                         FROM shift_assignments WHERE user_id = ?1 AND id != ?2",
                    )?;
                    let rows = stmt.query_map(params![assignment.user, assignment.id], map_assignment_row)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                };
                if let Some(clash) = existing.iter().find(|other| other.validity.overlaps(&assignment.validity)) {
                    return Err(AttendanceError::IntegrityConflict(format!(
                        "assignment {} for user {} overlaps assignment {}",
                        assignment.id, assignment.user, clash.id
                    ))
                    .into());
                }

                let shift = match assignment.target {
                    AssignmentTarget::Shift(id) => Some(id),
                    AssignmentTarget::WorkingHours => None,
                };
                tx.execute(
                    "INSERT OR REPLACE INTO shift_assignments (id, user_id, shift_id, applicable_from, applicable_to)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        assignment.id,
                        assignment.user,
                        shift,
                        day(assignment.validity.from),
                        assignment.validity.to.map(day)
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
    }

    pub async fn save_roster(&self, roster: &RosterOverride) -> Result<()> {
        let roster = roster.clone();
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO roster_overrides (user_id, date, shift_id) VALUES (?1, ?2, ?3)",
                    params![roster.user, day(roster.date), roster.shift],
                )?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl ShiftRepository for SqliteShiftRepository {
    async fn assignments_for_user(&self, user: UserId) -> Result<Vec<ShiftAssignment>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, shift_id, applicable_from, applicable_to
                     FROM shift_assignments WHERE user_id = ?1",
                )?;
                let rows = stmt.query_map(params![user], map_assignment_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }

    async fn roster_override(&self, user: UserId, date: NaiveDate) -> Result<Option<RosterOverride>> {
        self.db
            .run(move |conn| {
                let roster = conn
                    .query_row(
                        "SELECT user_id, date, shift_id FROM roster_overrides WHERE user_id = ?1 AND date = ?2",
                        params![user, day(date)],
                        |row| {
                            Ok(RosterOverride { user: row.get(0)?, date: date_at(row, 1)?, shift: row.get(2)? })
                        },
                    )
                    .optional()?;
                Ok(roster)
            })
            .await
    }

    async fn shift(&self, id: ShiftId) -> Result<Option<ShiftDefinition>> {
        self.db.run(move |conn| load_shift(conn, id)).await
    }

    async fn users_with_assignment_on(&self, date: NaiveDate) -> Result<Vec<UserId>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT user_id FROM shift_assignments
                     WHERE applicable_from <= ?1 AND (applicable_to IS NULL OR applicable_to >= ?1)
                     ORDER BY user_id",
                )?;
                let rows = stmt.query_map(params![day(date)], |row| row.get(0))?;
                Ok(rows.collect::<rusqlite::Result<Vec<UserId>>>()?)
            })
            .await
    }
}

fn load_shift(conn: &Connection, id: ShiftId) -> InfraResult<Option<ShiftDefinition>> {
    let header = conn
        .query_row(
            "SELECT id, organization_id, name, start_time_grace_secs, end_time_grace_secs
             FROM shifts WHERE id = ?1",
            params![id],
            |row| {
                Ok(ShiftDefinition {
                    id: row.get(0)?,
                    organization: row.get(1)?,
                    name: row.get(2)?,
                    start_time_grace_secs: row.get(3)?,
                    end_time_grace_secs: row.get(4)?,
                    work_days: Vec::new(),
                })
            },
        )
        .optional()?;
    let Some(mut shift) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT d.id, d.weekday, d.applicable_from, d.applicable_to,
                t.id, t.start_time, t.end_time, t.extends, t.working_minutes
         FROM shift_work_days d
         LEFT JOIN shift_timings t ON t.work_day_id = d.id
         WHERE d.shift_id = ?1
         ORDER BY d.id, t.start_time",
    )?;
    let mut rows = stmt.query(params![id])?;

    let mut days: BTreeMap<i64, WorkDay> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let work_day_id: i64 = row.get(0)?;
        if !days.contains_key(&work_day_id) {
            days.insert(work_day_id, map_work_day(row)?);
        }
        let timing_id: Option<i64> = row.get(4)?;
        if let (Some(timing_id), Some(work_day)) = (timing_id, days.get_mut(&work_day_id)) {
            work_day.timings.push(WorkTiming {
                id: timing_id,
                start_time: time_at(row, 5)?,
                end_time: time_at(row, 6)?,
                extends: row.get(7)?,
                working_minutes: row.get(8)?,
            });
        }
    }

    shift.work_days = days.into_values().collect();
    Ok(Some(shift))
}

fn map_work_day(row: &Row<'_>) -> rusqlite::Result<WorkDay> {
    let weekday: u8 = row.get(1)?;
    let day = Weekday::try_from(weekday).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Integer, Box::new(err))
    })?;
    Ok(WorkDay {
        day,
        validity: DateRange { from: date_at(row, 2)?, to: date_opt(row, 3)? },
        timings: Vec::new(),
    })
}

fn map_assignment_row(row: &Row<'_>) -> rusqlite::Result<ShiftAssignment> {
    let shift: Option<ShiftId> = row.get(2)?;
    Ok(ShiftAssignment {
        id: row.get(0)?,
        user: row.get(1)?,
        target: shift.map_or(AssignmentTarget::WorkingHours, AssignmentTarget::Shift),
        validity: DateRange { from: date_at(row, 3)?, to: date_opt(row, 4)? },
    })
}

/// Holiday calendar over the `holidays` table. A holiday with audience rows
/// applies only to those users.
pub struct SqliteHolidayCalendar {
    db: Arc<DbManager>,
}

impl SqliteHolidayCalendar {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Add a holiday; an empty `audience` means everyone.
    pub async fn add_holiday(&self, date: NaiveDate, name: &str, audience: &[UserId]) -> Result<i64> {
        let name = name.to_owned();
        let audience = audience.to_vec();
        self.db
            .run(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("INSERT INTO holidays (date, name) VALUES (?1, ?2)", params![day(date), name])?;
                let id = tx.last_insert_rowid();
                for user in audience {
                    tx.execute(
                        "INSERT INTO holiday_audience (holiday_id, user_id) VALUES (?1, ?2)",
                        params![id, user],
                    )?;
                }
                tx.commit()?;
                Ok(id)
            })
            .await
    }
}

#[async_trait]
impl HolidayCalendar for SqliteHolidayCalendar {
    async fn is_holiday(&self, user: UserId, date: NaiveDate) -> Result<bool> {
        self.db
            .run(move |conn| {
                let found: bool = conn.query_row(
                    "SELECT EXISTS (
                        SELECT 1 FROM holidays h
                        WHERE h.date = ?1
                          AND (NOT EXISTS (SELECT 1 FROM holiday_audience a WHERE a.holiday_id = h.id)
                               OR EXISTS (SELECT 1 FROM holiday_audience a
                                          WHERE a.holiday_id = h.id AND a.user_id = ?2))
                    )",
                    params![day(date), user],
                    |row| row.get(0),
                )?;
                Ok(found)
            })
            .await
    }
}
