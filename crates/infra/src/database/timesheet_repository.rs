//! SQLite implementation of [`TimesheetRepository`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use timekeep_common::time::Clock;
use timekeep_core::TimesheetRepository;
use timekeep_domain::{
    AttendanceError, DerivedFields, EntryId, NewTimesheet, NewTimesheetEntry, Recategorization,
    Result, ScheduleFields, Timesheet, TimesheetEntry, TimesheetId, TimesheetKey, UserId,
};
use tracing::debug;

use super::codec::{
    date_at, day, epoch, epoch_opt, instant_at, instant_opt, label, label_opt, placeholders,
    truncate,
};
use super::manager::DbManager;
use crate::errors::InfraResult;

const SHEET_COLUMNS: &str = "id, user_id, shift_id, timing_id, date, expected_in, expected_out,
    coefficient, leave_coefficient, start_grace_secs, end_grace_secs, working_minutes,
    punch_in, punch_out, punch_in_delta_secs, punch_out_delta_secs, punctuality,
    worked_secs, unpaid_break_secs, is_present, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, timesheet_id, timestamp, entry_method, entry_type, category,
    remark_category, remarks, source_device_id, is_deleted, created_at";

pub struct SqliteTimesheetRepository {
    db: Arc<DbManager>,
    clock: Arc<dyn Clock>,
}

impl SqliteTimesheetRepository {
    pub fn new(db: Arc<DbManager>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        truncate(self.clock.now())
    }

    async fn query_sheets(&self, sql: String, args: Vec<Value>) -> Result<Vec<Timesheet>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(args), map_sheet_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }
}

#[async_trait]
impl TimesheetRepository for SqliteTimesheetRepository {
    async fn find(&self, id: TimesheetId) -> Result<Option<Timesheet>> {
        self.db.run(move |conn| load_sheet(conn, id)).await
    }

    async fn find_by_key(&self, key: &TimesheetKey) -> Result<Option<Timesheet>> {
        let key = *key;
        self.db
            .run(move |conn| {
                let sheet = conn
                    .query_row(
                        &format!(
                            "SELECT {SHEET_COLUMNS} FROM timesheets
                             WHERE user_id = ?1 AND shift_id IS ?2 AND timing_id IS ?3 AND date = ?4"
                        ),
                        params![key.user, key.shift, key.timing, day(key.date)],
                        map_sheet_row,
                    )
                    .optional()?;
                Ok(sheet)
            })
            .await
    }

    async fn find_for_user_dates(&self, user: UserId, dates: &[NaiveDate]) -> Result<Vec<Timesheet>> {
        if dates.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {SHEET_COLUMNS} FROM timesheets WHERE user_id = ?1 AND date IN ({})
             ORDER BY date, expected_in",
            placeholders(2, dates.len())
        );
        let mut args: Vec<Value> = vec![user.into()];
        args.extend(dates.iter().map(|date| Value::from(day(*date))));
        self.query_sheets(sql, args).await
    }

    async fn insert(&self, timesheet: NewTimesheet) -> Result<Timesheet> {
        let now = self.now();
        self.db
            .run(move |conn| {
                let schedule = &timesheet.schedule;
                conn.execute(
                    "INSERT INTO timesheets (
                        user_id, shift_id, timing_id, date, expected_in, expected_out,
                        coefficient, leave_coefficient, start_grace_secs, end_grace_secs,
                        working_minutes, created_at, updated_at
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                    params![
                        timesheet.user,
                        timesheet.shift,
                        timesheet.timing,
                        day(timesheet.date),
                        epoch_opt(schedule.expected_in),
                        epoch_opt(schedule.expected_out),
                        schedule.coefficient.as_str(),
                        schedule.leave_coefficient.as_str(),
                        schedule.start_grace_secs,
                        schedule.end_grace_secs,
                        schedule.working_minutes,
                        epoch(now)
                    ],
                )?;
                let id = conn.last_insert_rowid();
                debug!(timesheet = id, user = timesheet.user, date = %timesheet.date, "timesheet.inserted");
                require_sheet(conn, id)
            })
            .await
    }

    async fn update_schedule(&self, id: TimesheetId, schedule: &ScheduleFields) -> Result<Timesheet> {
        let schedule = schedule.clone();
        let now = self.now();
        self.db
            .run(move |conn| {
                let updated = conn.execute(
                    "UPDATE timesheets SET
                        expected_in = ?2, expected_out = ?3, coefficient = ?4,
                        leave_coefficient = ?5, start_grace_secs = ?6, end_grace_secs = ?7,
                        working_minutes = ?8, updated_at = ?9
                     WHERE id = ?1",
                    params![
                        id,
                        epoch_opt(schedule.expected_in),
                        epoch_opt(schedule.expected_out),
                        schedule.coefficient.as_str(),
                        schedule.leave_coefficient.as_str(),
                        schedule.start_grace_secs,
                        schedule.end_grace_secs,
                        schedule.working_minutes,
                        epoch(now)
                    ],
                )?;
                if updated == 0 {
                    return Err(AttendanceError::NotFound(format!("timesheet {id}")).into());
                }
                require_sheet(conn, id)
            })
            .await
    }

    async fn entries(&self, timesheet: TimesheetId) -> Result<Vec<TimesheetEntry>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM timesheet_entries
                     WHERE timesheet_id = ?1 ORDER BY timestamp, id"
                ))?;
                let rows = stmt.query_map(params![timesheet], map_entry_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }

    async fn insert_entry(&self, entry: NewTimesheetEntry) -> Result<TimesheetEntry> {
        let now = self.now();
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO timesheet_entries (
                        timesheet_id, timestamp, entry_method, entry_type, category,
                        remark_category, remarks, source_device_id, created_at
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        entry.timesheet,
                        epoch(entry.timestamp),
                        entry.method.as_str(),
                        entry.entry_type.as_str(),
                        entry.category.as_str(),
                        entry.remark_category.map(|remark| remark.as_str()),
                        entry.remarks,
                        entry.source_device,
                        epoch(now)
                    ],
                )?;
                let id = conn.last_insert_rowid();
                load_entry(conn, id)?
                    .ok_or_else(|| AttendanceError::Internal(format!("entry {id} vanished after insert")).into())
            })
            .await
    }

    async fn find_entry(&self, id: EntryId) -> Result<Option<TimesheetEntry>> {
        self.db.run(move |conn| load_entry(conn, id)).await
    }

    async fn soft_delete_entry(&self, id: EntryId) -> Result<bool> {
        self.db
            .run(move |conn| {
                let deleted: Option<bool> = conn
                    .query_row(
                        "SELECT is_deleted FROM timesheet_entries WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                match deleted {
                    None => Err(AttendanceError::NotFound(format!("entry {id}")).into()),
                    Some(true) => Ok(false),
                    Some(false) => {
                        let changed = conn.execute(
                            "UPDATE timesheet_entries SET is_deleted = 1 WHERE id = ?1 AND is_deleted = 0",
                            params![id],
                        )?;
                        Ok(changed == 1)
                    }
                }
            })
            .await
    }

    async fn apply_recategorization(&self, recategorization: &Recategorization) -> Result<()> {
        let recategorization = recategorization.clone();
        let now = self.now();
        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                {
                    let mut update = tx.prepare(
                        "UPDATE timesheet_entries SET entry_type = ?2, category = ?3
                         WHERE id = ?1 AND timesheet_id = ?4",
                    )?;
                    for classification in &recategorization.entries {
                        update.execute(params![
                            classification.entry,
                            classification.entry_type.as_str(),
                            classification.category.as_str(),
                            recategorization.timesheet
                        ])?;
                    }
                }

                let current = load_sheet(&tx, recategorization.timesheet)?.ok_or_else(|| {
                    AttendanceError::NotFound(format!("timesheet {}", recategorization.timesheet))
                })?;
                if current.derived != recategorization.derived {
                    write_derived(&tx, recategorization.timesheet, &recategorization.derived, now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }

    async fn modified_since(&self, since: DateTime<Utc>) -> Result<Vec<Timesheet>> {
        let sql = format!(
            "SELECT {SHEET_COLUMNS} FROM timesheets WHERE updated_at >= ?1 ORDER BY updated_at, id"
        );
        self.query_sheets(sql, vec![epoch(since).into()]).await
    }

    async fn for_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Timesheet>> {
        let sql = format!(
            "SELECT {SHEET_COLUMNS} FROM timesheets WHERE date BETWEEN ?1 AND ?2 ORDER BY date, user_id, id"
        );
        self.query_sheets(sql, vec![day(start).into(), day(end).into()]).await
    }
}

fn write_derived(conn: &Connection, id: TimesheetId, derived: &DerivedFields, now: DateTime<Utc>) -> InfraResult<()> {
    conn.execute(
        "UPDATE timesheets SET
            punch_in = ?2, punch_out = ?3, punch_in_delta_secs = ?4, punch_out_delta_secs = ?5,
            punctuality = ?6, worked_secs = ?7, unpaid_break_secs = ?8, is_present = ?9,
            updated_at = ?10
         WHERE id = ?1",
        params![
            id,
            epoch_opt(derived.punch_in),
            epoch_opt(derived.punch_out),
            derived.punch_in_delta_secs,
            derived.punch_out_delta_secs,
            derived.punctuality,
            derived.worked_secs,
            derived.unpaid_break_secs,
            derived.is_present,
            epoch(now)
        ],
    )?;
    Ok(())
}

fn load_sheet(conn: &Connection, id: TimesheetId) -> InfraResult<Option<Timesheet>> {
    let sheet = conn
        .query_row(
            &format!("SELECT {SHEET_COLUMNS} FROM timesheets WHERE id = ?1"),
            params![id],
            map_sheet_row,
        )
        .optional()?;
    Ok(sheet)
}

fn require_sheet(conn: &Connection, id: TimesheetId) -> InfraResult<Timesheet> {
    load_sheet(conn, id)?.ok_or_else(|| AttendanceError::NotFound(format!("timesheet {id}")).into())
}

fn load_entry(conn: &Connection, id: EntryId) -> InfraResult<Option<TimesheetEntry>> {
    let entry = conn
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM timesheet_entries WHERE id = ?1"),
            params![id],
            map_entry_row,
        )
        .optional()?;
    Ok(entry)
}

fn map_sheet_row(row: &Row<'_>) -> rusqlite::Result<Timesheet> {
    Ok(Timesheet {
        id: row.get(0)?,
        user: row.get(1)?,
        shift: row.get(2)?,
        timing: row.get(3)?,
        date: date_at(row, 4)?,
        schedule: ScheduleFields {
            expected_in: instant_opt(row, 5)?,
            expected_out: instant_opt(row, 6)?,
            coefficient: label(row, 7)?,
            leave_coefficient: label(row, 8)?,
            start_grace_secs: row.get(9)?,
            end_grace_secs: row.get(10)?,
            working_minutes: row.get(11)?,
        },
        derived: DerivedFields {
            punch_in: instant_opt(row, 12)?,
            punch_out: instant_opt(row, 13)?,
            punch_in_delta_secs: row.get(14)?,
            punch_out_delta_secs: row.get(15)?,
            punctuality: row.get(16)?,
            worked_secs: row.get(17)?,
            unpaid_break_secs: row.get(18)?,
            is_present: row.get(19)?,
        },
        created_at: instant_at(row, 20)?,
        updated_at: instant_at(row, 21)?,
    })
}

fn map_entry_row(row: &Row<'_>) -> rusqlite::Result<TimesheetEntry> {
    Ok(TimesheetEntry {
        id: row.get(0)?,
        timesheet: row.get(1)?,
        timestamp: instant_at(row, 2)?,
        method: label(row, 3)?,
        entry_type: label(row, 4)?,
        category: label(row, 5)?,
        remark_category: label_opt(row, 6)?,
        remarks: row.get(7)?,
        source_device: row.get(8)?,
        is_deleted: row.get(9)?,
        created_at: instant_at(row, 10)?,
    })
}
