//! SQLite implementation of the overtime ports.
//!
//! An [`OvertimeRecord`] is an `overtime_entries` row joined with its one
//! `overtime_claims` row. Settings are kept as a JSON `policy` document so
//! new knobs need no migration; the id, organization and name columns are
//! authoritative over the document.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use timekeep_core::{CompensatoryRules, OvertimeRepository};
use timekeep_domain::{
    AttendanceError, ClaimHistory, ClaimId, ClaimStatus, CompensatoryRule, NewOvertime,
    OvertimeClaim, OvertimeDetail, OvertimeEntry, OvertimeEntryId, OvertimeRecord,
    OvertimeSetting, OvertimeSettingId, Result, TimesheetId, UserId,
};
use tracing::{debug, info};

use super::codec::{epoch, instant_at, json, json_opt, label, to_json};
use super::manager::DbManager;
use crate::errors::InfraResult;

const RECORD_SELECT: &str = "SELECT e.id, e.user_id, e.setting_id, e.timesheet_id,
        e.punch_in_overtime_secs, e.punch_out_overtime_secs, e.claimed_secs, e.normalized_secs,
        e.created_at, c.id, c.recipient_id, c.status, c.description, c.is_archived,
        c.created_at, c.updated_at
    FROM overtime_entries e
    JOIN overtime_claims c ON c.entry_id = e.id";

pub struct SqliteOvertimeRepository {
    db: Arc<DbManager>,
}

impl SqliteOvertimeRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert or replace an overtime setting.
    pub async fn save_setting(&self, setting: &OvertimeSetting) -> Result<()> {
        let policy = to_json(setting)?;
        let setting = setting.clone();
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO overtime_settings (id, organization_id, name, policy)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                        organization_id = excluded.organization_id,
                        name = excluded.name,
                        policy = excluded.policy",
                    params![setting.id, setting.organization, setting.name, policy],
                )?;
                Ok(())
            })
            .await
    }

    /// Make `setting` the user's current overtime setting.
    pub async fn assign_setting(&self, user: UserId, setting: OvertimeSettingId) -> Result<()> {
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO overtime_assignments (user_id, setting_id) VALUES (?1, ?2)
                     ON CONFLICT(user_id) DO UPDATE SET setting_id = excluded.setting_id",
                    params![user, setting],
                )?;
                Ok(())
            })
            .await
    }

    async fn load_setting(&self, sql: &'static str, key: i64) -> Result<Option<OvertimeSetting>> {
        self.db
            .run(move |conn| {
                let setting = conn.query_row(sql, params![key], map_setting_row).optional()?;
                Ok(setting)
            })
            .await
    }

    async fn load_record(&self, filter: &'static str, key: i64) -> Result<Option<OvertimeRecord>> {
        self.db.run(move |conn| record_where(conn, filter, key)).await
    }
}

#[async_trait]
impl OvertimeRepository for SqliteOvertimeRepository {
    async fn setting_for_user(&self, user: UserId) -> Result<Option<OvertimeSetting>> {
        self.load_setting(
            "SELECT s.id, s.organization_id, s.name, s.policy
             FROM overtime_assignments a
             JOIN overtime_settings s ON s.id = a.setting_id
             WHERE a.user_id = ?1",
            user,
        )
        .await
    }

    async fn setting(&self, id: OvertimeSettingId) -> Result<Option<OvertimeSetting>> {
        self.load_setting("SELECT id, organization_id, name, policy FROM overtime_settings WHERE id = ?1", id)
            .await
    }

    async fn record_for_timesheet(&self, timesheet: TimesheetId) -> Result<Option<OvertimeRecord>> {
        self.load_record("e.timesheet_id = ?1", timesheet).await
    }

    async fn claim(&self, id: ClaimId) -> Result<Option<OvertimeRecord>> {
        self.load_record("c.id = ?1", id).await
    }

    async fn insert_generated(&self, overtime: NewOvertime) -> Result<OvertimeRecord> {
        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let record = insert_record(&tx, &overtime)?;
                tx.commit()?;
                debug!(
                    timesheet = overtime.timesheet,
                    claim = record.claim.id,
                    claimed_secs = overtime.detail.claimed_secs,
                    "overtime.inserted"
                );
                Ok(record)
            })
            .await
    }

    async fn replace_generated(
        &self,
        old: OvertimeEntryId,
        new: Option<NewOvertime>,
    ) -> Result<Option<OvertimeRecord>> {
        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                // Claims and their history cascade with the entry.
                tx.execute("DELETE FROM overtime_entries WHERE id = ?1", params![old])?;
                let record = new.as_ref().map(|overtime| insert_record(&tx, overtime)).transpose()?;
                tx.commit()?;
                Ok(record)
            })
            .await
    }

    async fn update_detail(
        &self,
        entry: OvertimeEntryId,
        detail: &OvertimeDetail,
        history: ClaimHistory,
    ) -> Result<OvertimeRecord> {
        let detail = *detail;
        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let updated = tx.execute(
                    "UPDATE overtime_entries SET
                        punch_in_overtime_secs = ?2, punch_out_overtime_secs = ?3,
                        claimed_secs = ?4, normalized_secs = ?5
                     WHERE id = ?1",
                    params![
                        entry,
                        detail.punch_in_overtime_secs,
                        detail.punch_out_overtime_secs,
                        detail.claimed_secs,
                        detail.normalized_secs
                    ],
                )?;
                if updated == 0 {
                    return Err(AttendanceError::NotFound(format!("overtime entry {entry}")).into());
                }
                tx.execute(
                    "UPDATE overtime_claims SET updated_at = ?2 WHERE entry_id = ?1",
                    params![entry, epoch(history.created_at)],
                )?;
                insert_history(&tx, &history)?;
                let record = record_where(&tx, "e.id = ?1", entry)?
                    .ok_or_else(|| AttendanceError::NotFound(format!("claim for overtime entry {entry}")))?;
                tx.commit()?;
                Ok(record)
            })
            .await
    }

    async fn update_claim_status(
        &self,
        claim: ClaimId,
        status: ClaimStatus,
        history: ClaimHistory,
    ) -> Result<OvertimeRecord> {
        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let updated = tx.execute(
                    "UPDATE overtime_claims SET status = ?2, updated_at = ?3 WHERE id = ?1",
                    params![claim, status.as_str(), epoch(history.created_at)],
                )?;
                if updated == 0 {
                    return Err(AttendanceError::NotFound(format!("claim {claim}")).into());
                }
                insert_history(&tx, &history)?;
                let record = record_where(&tx, "c.id = ?1", claim)?
                    .ok_or_else(|| AttendanceError::NotFound(format!("claim {claim}")))?;
                tx.commit()?;
                Ok(record)
            })
            .await
    }

    async fn unclaimed_claims(&self) -> Result<Vec<OvertimeRecord>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{RECORD_SELECT} WHERE c.status = ?1 AND c.is_archived = 0 ORDER BY c.id"
                ))?;
                let rows = stmt.query_map(params![ClaimStatus::Unclaimed.as_str()], map_record_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }

    async fn archive_claims(&self, claims: &[ClaimId], history: Vec<ClaimHistory>) -> Result<usize> {
        if claims.is_empty() {
            return Ok(0);
        }
        let claims = claims.to_vec();
        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let mut archived = Vec::with_capacity(claims.len());
                {
                    let mut archive =
                        tx.prepare("UPDATE overtime_claims SET is_archived = 1 WHERE id = ?1 AND is_archived = 0")?;
                    for claim in &claims {
                        if archive.execute(params![claim])? == 1 {
                            archived.push(*claim);
                        }
                    }
                }
                for row in history.iter().filter(|row| archived.contains(&row.claim)) {
                    insert_history(&tx, row)?;
                }
                tx.commit()?;
                info!(requested = claims.len(), archived = archived.len(), "overtime.claims_archived");
                Ok(archived.len())
            })
            .await
    }

    async fn history(&self, claim: ClaimId) -> Result<Vec<ClaimHistory>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT claim_id, action, actor_id, remarks, previous, current, created_at
                     FROM overtime_claim_history WHERE claim_id = ?1 ORDER BY id",
                )?;
                let rows = stmt.query_map(params![claim], |row| {
                    Ok(ClaimHistory {
                        claim: row.get(0)?,
                        action: label(row, 1)?,
                        actor: row.get(2)?,
                        remarks: row.get(3)?,
                        previous: json_opt(row, 4)?,
                        current: json_opt(row, 5)?,
                        created_at: instant_at(row, 6)?,
                    })
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }
}

fn insert_record(conn: &Connection, overtime: &NewOvertime) -> InfraResult<OvertimeRecord> {
    let created_at = epoch(overtime.created_at);
    conn.execute(
        "INSERT INTO overtime_entries (
            user_id, setting_id, timesheet_id, punch_in_overtime_secs, punch_out_overtime_secs,
            claimed_secs, normalized_secs, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            overtime.user,
            overtime.setting,
            overtime.timesheet,
            overtime.detail.punch_in_overtime_secs,
            overtime.detail.punch_out_overtime_secs,
            overtime.detail.claimed_secs,
            overtime.detail.normalized_secs,
            created_at
        ],
    )?;
    let entry = conn.last_insert_rowid();

    conn.execute(
        "INSERT INTO overtime_claims (entry_id, recipient_id, status, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![entry, overtime.user, ClaimStatus::Unclaimed.as_str(), overtime.remarks, created_at],
    )?;
    let claim = conn.last_insert_rowid();

    insert_history(
        conn,
        &ClaimHistory {
            claim,
            action: ClaimStatus::Unclaimed,
            actor: None,
            remarks: overtime.remarks.clone(),
            previous: None,
            current: Some(overtime.detail),
            created_at: overtime.created_at,
        },
    )?;

    record_where(conn, "e.id = ?1", entry)?
        .ok_or_else(|| AttendanceError::Internal(format!("overtime entry {entry} vanished after insert")).into())
}

fn insert_history(conn: &Connection, history: &ClaimHistory) -> InfraResult<()> {
    let previous = history.previous.as_ref().map(to_json).transpose()?;
    let current = history.current.as_ref().map(to_json).transpose()?;
    conn.execute(
        "INSERT INTO overtime_claim_history (claim_id, action, actor_id, remarks, previous, current, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            history.claim,
            history.action.as_str(),
            history.actor,
            history.remarks,
            previous,
            current,
            epoch(history.created_at)
        ],
    )?;
    Ok(())
}

fn record_where(conn: &Connection, filter: &str, key: i64) -> InfraResult<Option<OvertimeRecord>> {
    let record = conn
        .query_row(&format!("{RECORD_SELECT} WHERE {filter}"), params![key], map_record_row)
        .optional()?;
    Ok(record)
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<OvertimeRecord> {
    let entry = OvertimeEntry {
        id: row.get(0)?,
        user: row.get(1)?,
        setting: row.get(2)?,
        timesheet: row.get(3)?,
        detail: OvertimeDetail {
            punch_in_overtime_secs: row.get(4)?,
            punch_out_overtime_secs: row.get(5)?,
            claimed_secs: row.get(6)?,
            normalized_secs: row.get(7)?,
        },
        created_at: instant_at(row, 8)?,
    };
    let claim = OvertimeClaim {
        id: row.get(9)?,
        entry: entry.id,
        recipient: row.get(10)?,
        status: label(row, 11)?,
        description: row.get(12)?,
        is_archived: row.get(13)?,
        created_at: instant_at(row, 14)?,
        updated_at: instant_at(row, 15)?,
    };
    Ok(OvertimeRecord { entry, claim })
}

fn map_setting_row(row: &Row<'_>) -> rusqlite::Result<OvertimeSetting> {
    let mut setting: OvertimeSetting = json(row, 3)?;
    setting.id = row.get(0)?;
    setting.organization = row.get(1)?;
    setting.name = row.get(2)?;
    Ok(setting)
}

/// Compensatory rules published into `compensatory_rules` by the leave
/// subsystem. Users without rows have no compensatory leave account.
pub struct SqliteCompensatoryRules {
    db: Arc<DbManager>,
}

impl SqliteCompensatoryRules {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    pub async fn publish(&self, user: UserId, rules: &[CompensatoryRule]) -> Result<()> {
        let rules = rules.to_vec();
        self.db
            .run(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM compensatory_rules WHERE user_id = ?1", params![user])?;
                for rule in &rules {
                    tx.execute(
                        "INSERT INTO compensatory_rules (user_id, hours_in_off_day, balance_to_grant)
                         VALUES (?1, ?2, ?3)",
                        params![user, rule.hours_in_off_day, rule.balance_to_grant],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl CompensatoryRules for SqliteCompensatoryRules {
    async fn rules_for(&self, user: UserId) -> Result<Option<Vec<CompensatoryRule>>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT hours_in_off_day, balance_to_grant FROM compensatory_rules
                     WHERE user_id = ?1 ORDER BY hours_in_off_day",
                )?;
                let rows = stmt.query_map(params![user], |row| {
                    Ok(CompensatoryRule { hours_in_off_day: row.get(0)?, balance_to_grant: row.get(1)? })
                })?;
                let rules = rows.collect::<rusqlite::Result<Vec<_>>>()?;
                Ok((!rules.is_empty()).then_some(rules))
            })
            .await
    }
}
