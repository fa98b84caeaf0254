//! Overtime generation, the claim workflow and the batch sweeps.
//!
//! Public methods take the per-user lock; the `*_locked` helpers assume it is
//! already held so sweeps can reuse them without re-entering the lock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use timekeep_common::sync::KeyedLocks;
use timekeep_common::time::Clock;
use timekeep_domain::constants::{
    OVERTIME_EDITED_REMARK, OVERTIME_EXPIRED_REMARK, OVERTIME_GENERATED_REMARK,
    OVERTIME_RECALIBRATED_REMARK,
};
use timekeep_domain::{
    AttendanceError, AttendanceEvent, ClaimHistory, ClaimId, ClaimStatus, EditRejection,
    NewOvertime, OvertimeCalculation, OvertimeRecord, OvertimeSetting, OvertimeSettingId,
    PolicyRejection, Result, Timesheet, TimesheetId, UserId,
};
use tracing::{debug, info, instrument, warn};

use super::calculator::{self, Assessment, DayKind};
use super::ports::{CompensatoryRules, OvertimeRepository};
use crate::events::{dispatch, EventSink};
use crate::settings::EngineSettings;
use crate::timesheet::{ScheduleChangeListener, TimesheetRepository};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OvertimeOutcome {
    Generated(OvertimeRecord),
    Rejected(PolicyRejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Updated(OvertimeRecord),
    Rejected(EditRejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecalibrationOutcome {
    /// The old entry was deleted and a fresh one generated.
    Regenerated(OvertimeRecord),
    /// The old entry was deleted and the sheet no longer qualifies.
    Removed(PolicyRejection),
    /// The recomputed detail equals the stored one.
    Unchanged,
    /// The claim is past the employee's hands.
    Skipped(ClaimStatus),
    NoEntry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub generated: usize,
    pub recalibrated: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct OvertimeService {
    timesheets: Arc<dyn TimesheetRepository>,
    repository: Arc<dyn OvertimeRepository>,
    compensatory: Arc<dyn CompensatoryRules>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    locks: Arc<KeyedLocks<UserId>>,
}

impl OvertimeService {
    pub fn new(
        timesheets: Arc<dyn TimesheetRepository>,
        repository: Arc<dyn OvertimeRepository>,
        compensatory: Arc<dyn CompensatoryRules>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
        locks: Arc<KeyedLocks<UserId>>,
    ) -> Self {
        Self { timesheets, repository, compensatory, events, clock, settings, locks }
    }

    /// Generate overtime for one timesheet.
    #[instrument(skip(self))]
    pub async fn generate(&self, timesheet: TimesheetId) -> Result<OvertimeOutcome> {
        let user = self.load_sheet(timesheet).await?.user;
        let _guard = self.locks.lock(user).await;
        let sheet = self.load_sheet(timesheet).await?;
        self.generate_locked(&sheet).await
    }

    /// Lower the claimed early/late overtime of an open claim.
    #[instrument(skip(self, remarks))]
    pub async fn edit_claimed(
        &self,
        claim: ClaimId,
        punch_in_overtime_secs: i64,
        punch_out_overtime_secs: i64,
        remarks: Option<String>,
        actor: Option<UserId>,
    ) -> Result<EditOutcome> {
        let user = self.load_claim(claim).await?.entry.user;
        let _guard = self.locks.lock(user).await;
        let record = self.load_claim(claim).await?;

        if record.claim.is_archived || !record.claim.status.is_open() {
            return Err(AttendanceError::validation(
                "claim",
                format!("claim {claim} is {} and can no longer be edited", record.claim.status),
            ));
        }

        let setting = self.load_setting(record.entry.setting).await?;
        let current = record.entry.detail;
        if let Err(rejection) =
            calculator::validate_edit(&current, punch_in_overtime_secs, punch_out_overtime_secs, &setting)
        {
            debug!(claim, ?rejection, "overtime.edit_rejected");
            return Ok(EditOutcome::Rejected(rejection));
        }

        let sheet = self.load_sheet(record.entry.timesheet).await?;
        let detail = calculator::build_detail(&sheet, &setting, punch_in_overtime_secs, punch_out_overtime_secs);
        let history = ClaimHistory {
            claim,
            action: record.claim.status,
            actor,
            remarks: remarks.unwrap_or_else(|| OVERTIME_EDITED_REMARK.to_string()),
            previous: Some(current),
            current: Some(detail),
            created_at: self.clock.now(),
        };
        let updated = self.repository.update_detail(record.entry.id, &detail, history).await?;
        info!(claim, claimed_secs = detail.claimed_secs, "overtime.edited");
        Ok(EditOutcome::Updated(updated))
    }

    /// Move a claim through the workflow.
    #[instrument(skip(self, remarks))]
    pub async fn transition(
        &self,
        claim: ClaimId,
        status: ClaimStatus,
        actor: Option<UserId>,
        remarks: impl Into<String> + Send,
    ) -> Result<OvertimeRecord> {
        let user = self.load_claim(claim).await?.entry.user;
        let _guard = self.locks.lock(user).await;
        let record = self.load_claim(claim).await?;

        if record.claim.is_archived {
            return Err(AttendanceError::validation("claim", format!("claim {claim} has expired")));
        }
        if !record.claim.status.can_transition_to(status) {
            return Err(AttendanceError::validation(
                "status",
                format!("cannot move claim {claim} from {} to {status}", record.claim.status),
            ));
        }

        let history = ClaimHistory {
            claim,
            action: status,
            actor,
            remarks: remarks.into(),
            previous: None,
            current: Some(record.entry.detail),
            created_at: self.clock.now(),
        };
        let updated = self.repository.update_claim_status(claim, status, history).await?;
        info!(claim, from = %record.claim.status, to = %status, "overtime.claim_transitioned");
        Ok(updated)
    }

    /// Regenerate the overtime of a structurally changed timesheet.
    #[instrument(skip(self))]
    pub async fn recalibrate(&self, timesheet: TimesheetId) -> Result<RecalibrationOutcome> {
        let user = self.load_sheet(timesheet).await?.user;
        let _guard = self.locks.lock(user).await;
        let sheet = self.load_sheet(timesheet).await?;
        self.recalibrate_locked(&sheet).await
    }

    /// Archive every stale `Unclaimed` claim whose setting lets claims expire.
    #[instrument(skip(self))]
    pub async fn expire_claims(&self, today: NaiveDate) -> Result<usize> {
        let claims = self.repository.unclaimed_claims().await?;
        let mut settings: HashMap<OvertimeSettingId, Option<OvertimeSetting>> = HashMap::new();
        let mut expired = Vec::new();

        for record in claims {
            let setting_id = record.entry.setting;
            if !settings.contains_key(&setting_id) {
                let setting = self.repository.setting(setting_id).await?;
                settings.insert(setting_id, setting);
            }
            let Some(Some(setting)) = settings.get(&setting_id) else {
                continue;
            };
            if !setting.claim_expires {
                continue;
            }
            let created = self.settings.local_date(record.claim.created_at);
            let expires = setting.expires_after_unit.add_to(created, setting.expires_after);
            if expires.is_some_and(|expires| expires < today) {
                expired.push(record);
            }
        }

        if expired.is_empty() {
            return Ok(0);
        }

        let now = self.clock.now();
        let ids: Vec<ClaimId> = expired.iter().map(|record| record.claim.id).collect();
        let history = expired
            .iter()
            .map(|record| ClaimHistory {
                claim: record.claim.id,
                action: record.claim.status,
                actor: None,
                remarks: OVERTIME_EXPIRED_REMARK.to_string(),
                previous: None,
                current: Some(record.entry.detail),
                created_at: now,
            })
            .collect();
        let archived = self.repository.archive_claims(&ids, history).await?;

        let events: Vec<AttendanceEvent> = expired
            .iter()
            .map(|record| AttendanceEvent::OvertimeClaimExpired { claim: record.claim.id, user: record.entry.user })
            .collect();
        dispatch(self.events.as_ref(), &events).await;

        info!(%today, archived, "overtime.claims_expired");
        Ok(archived)
    }

    /// Generate or recalibrate overtime for every sheet modified since
    /// `since`, for users on daily calculation.
    #[instrument(skip(self))]
    pub async fn sweep_daily(&self, since: DateTime<Utc>) -> Result<SweepReport> {
        let sheets = self.timesheets.modified_since(since).await?;
        let report = self.sweep(sheets, OvertimeCalculation::Daily).await;
        info!(
            %since,
            generated = report.generated,
            recalibrated = report.recalibrated,
            rejected = report.rejected,
            failed = report.failed,
            "overtime.daily_sweep"
        );
        Ok(report)
    }

    /// Generate overtime for the ISO week containing `week_of`, for users on
    /// weekly calculation.
    #[instrument(skip(self))]
    pub async fn sweep_weekly(&self, week_of: NaiveDate) -> Result<SweepReport> {
        let monday = week_of - Duration::days(i64::from(week_of.weekday().num_days_from_monday()));
        let sunday = monday + Duration::days(6);
        let sheets = self.timesheets.for_range(monday, sunday).await?;
        let report = self.sweep(sheets, OvertimeCalculation::Weekly).await;
        info!(
            %monday,
            generated = report.generated,
            recalibrated = report.recalibrated,
            rejected = report.rejected,
            failed = report.failed,
            "overtime.weekly_sweep"
        );
        Ok(report)
    }

    /// Generate overtime for exactly these timesheets.
    #[instrument(skip(self))]
    pub async fn fix_missing(&self, ids: &[TimesheetId]) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        for &id in ids {
            match self.generate(id).await {
                Ok(OvertimeOutcome::Generated(_)) => report.generated += 1,
                Ok(OvertimeOutcome::Rejected(PolicyRejection::AlreadyExists)) => report.skipped += 1,
                Ok(OvertimeOutcome::Rejected(_)) => report.rejected += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(timesheet = id, error = %err, "overtime.fix_failed");
                }
            }
        }
        Ok(report)
    }

    async fn sweep(&self, sheets: Vec<Timesheet>, mode: OvertimeCalculation) -> SweepReport {
        let mut report = SweepReport::default();
        for sheet in sheets {
            let _guard = self.locks.lock(sheet.user).await;
            match self.sweep_one(sheet.id, mode).await {
                Ok(step) => {
                    report.generated += step.generated;
                    report.recalibrated += step.recalibrated;
                    report.rejected += step.rejected;
                    report.skipped += step.skipped;
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(timesheet = sheet.id, error = %err, kind = err.label(), "overtime.sweep_failed");
                }
            }
        }
        report
    }

    async fn sweep_one(&self, timesheet: TimesheetId, mode: OvertimeCalculation) -> Result<SweepReport> {
        let mut step = SweepReport::default();
        let sheet = self.load_sheet(timesheet).await?;

        if self.repository.record_for_timesheet(sheet.id).await?.is_some() {
            match self.recalibrate_locked(&sheet).await? {
                RecalibrationOutcome::Regenerated(_) => step.recalibrated += 1,
                RecalibrationOutcome::Removed(_) => step.rejected += 1,
                _ => step.skipped += 1,
            }
            return Ok(step);
        }

        let applies = self
            .repository
            .setting_for_user(sheet.user)
            .await?
            .is_some_and(|setting| setting.overtime_calculation == mode);
        if !applies {
            step.skipped += 1;
            return Ok(step);
        }

        match self.generate_locked(&sheet).await? {
            OvertimeOutcome::Generated(_) => step.generated += 1,
            OvertimeOutcome::Rejected(_) => step.rejected += 1,
        }
        Ok(step)
    }

    async fn generate_locked(&self, sheet: &Timesheet) -> Result<OvertimeOutcome> {
        if self.repository.record_for_timesheet(sheet.id).await?.is_some() {
            return Ok(self.rejected(sheet, PolicyRejection::AlreadyExists));
        }
        let Some(setting) = self.repository.setting_for_user(sheet.user).await? else {
            return Ok(self.rejected(sheet, PolicyRejection::NoSetting));
        };

        let overtime = match self.compute(sheet, &setting, OVERTIME_GENERATED_REMARK).await? {
            Ok(overtime) => overtime,
            Err(rejection) => return Ok(self.rejected(sheet, rejection)),
        };

        let record = self.repository.insert_generated(overtime).await?;
        info!(
            timesheet = sheet.id,
            claim = record.claim.id,
            claimed_secs = record.entry.detail.claimed_secs,
            "overtime.generated"
        );
        self.announce(&record).await;
        Ok(OvertimeOutcome::Generated(record))
    }

    async fn recalibrate_locked(&self, sheet: &Timesheet) -> Result<RecalibrationOutcome> {
        let Some(existing) = self.repository.record_for_timesheet(sheet.id).await? else {
            return Ok(RecalibrationOutcome::NoEntry);
        };
        if existing.claim.is_archived || !existing.claim.status.is_open() {
            debug!(timesheet = sheet.id, status = %existing.claim.status, "overtime.recalibration_skipped");
            return Ok(RecalibrationOutcome::Skipped(existing.claim.status));
        }

        let computed = match self.repository.setting_for_user(sheet.user).await? {
            Some(setting) => self.compute(sheet, &setting, OVERTIME_RECALIBRATED_REMARK).await?,
            None => Err(PolicyRejection::NoSetting),
        };

        match computed {
            Ok(overtime) if overtime.detail == existing.entry.detail && overtime.setting == existing.entry.setting => {
                Ok(RecalibrationOutcome::Unchanged)
            }
            Ok(overtime) => {
                let record = self
                    .repository
                    .replace_generated(existing.entry.id, Some(overtime))
                    .await?
                    .ok_or_else(|| AttendanceError::Internal(format!("regenerated overtime for timesheet {} vanished", sheet.id)))?;
                info!(timesheet = sheet.id, claim = record.claim.id, "overtime.recalibrated");
                self.announce(&record).await;
                Ok(RecalibrationOutcome::Regenerated(record))
            }
            Err(rejection) => {
                self.repository.replace_generated(existing.entry.id, None).await?;
                info!(timesheet = sheet.id, %rejection, "overtime.removed");
                Ok(RecalibrationOutcome::Removed(rejection))
            }
        }
    }

    async fn compute(
        &self,
        sheet: &Timesheet,
        setting: &OvertimeSetting,
        remarks: &str,
    ) -> Result<std::result::Result<NewOvertime, PolicyRejection>> {
        let rules = match DayKind::of(sheet) {
            DayKind::Offday | DayKind::Holiday => self.compensatory.rules_for(sheet.user).await?,
            _ => None,
        };

        let (early, late) = match calculator::assess(sheet, setting, rules.as_deref()) {
            Assessment::Qualified { early, late } => (early, late),
            Assessment::Rejected(rejection) => return Ok(Err(rejection)),
        };

        Ok(Ok(NewOvertime {
            user: sheet.user,
            setting: setting.id,
            timesheet: sheet.id,
            detail: calculator::build_detail(sheet, setting, early, late),
            remarks: remarks.to_string(),
            created_at: self.clock.now(),
        }))
    }

    fn rejected(&self, sheet: &Timesheet, rejection: PolicyRejection) -> OvertimeOutcome {
        debug!(timesheet = sheet.id, %rejection, "overtime.rejected");
        OvertimeOutcome::Rejected(rejection)
    }

    async fn announce(&self, record: &OvertimeRecord) {
        let event = AttendanceEvent::OvertimeGenerated { claim: record.claim.id, user: record.entry.user };
        dispatch(self.events.as_ref(), std::slice::from_ref(&event)).await;
    }

    async fn load_sheet(&self, id: TimesheetId) -> Result<Timesheet> {
        self.timesheets
            .find(id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("timesheet {id}")))
    }

    async fn load_claim(&self, id: ClaimId) -> Result<OvertimeRecord> {
        self.repository
            .claim(id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("overtime claim {id}")))
    }

    async fn load_setting(&self, id: OvertimeSettingId) -> Result<OvertimeSetting> {
        self.repository
            .setting(id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("overtime setting {id}")))
    }
}

#[async_trait]
impl ScheduleChangeListener for OvertimeService {
    async fn schedule_changed(&self, timesheet: &Timesheet) -> Result<()> {
        self.recalibrate(timesheet.id).await.map(|_| ())
    }
}
