//! In-memory implementations of the core ports.
//!
//! State sits behind a `parking_lot::Mutex` so services can write through
//! `Arc<dyn Port>` while tests inspect the same instance.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use timekeep_common::time::{Clock, MockClock};
use timekeep_core::{
    AttendanceSource, CompensatoryRules, DeviceRepository, EventSink, HolidayCalendar,
    JobStateRepository, OvertimeRepository, RawEventRepository, ShiftRepository,
    TimesheetRepository,
};
use timekeep_domain::{
    AssignmentTarget, AttendanceDevice, AttendanceError, AttendanceEvent, BioUserMap, ClaimHistory,
    ClaimId, ClaimStatus, CompensatoryRule, DeviceId, EntryId, NewOvertime, NewRawEvent,
    NewTimesheet, NewTimesheetEntry, OvertimeClaim, OvertimeDetail, OvertimeEntry,
    OvertimeEntryId, OvertimeRecord, OvertimeSetting, OvertimeSettingId, PullBatch, PulledEvent,
    RawEvent, RawEventId, Recategorization, Result, RosterOverride, ScheduleFields,
    ShiftAssignment, ShiftDefinition, ShiftId, SyncStatus, Timesheet, TimesheetEntry, TimesheetId,
    TimesheetKey, UserId,
};

// ---------------------------------------------------------------------------
// Shifts and holidays
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockShiftRepository {
    assignments: Mutex<Vec<ShiftAssignment>>,
    rosters: Mutex<Vec<RosterOverride>>,
    shifts: Mutex<Vec<ShiftDefinition>>,
}

impl MockShiftRepository {
    pub fn with_shift(self, shift: ShiftDefinition) -> Self {
        self.shifts.lock().push(shift);
        self
    }

    pub fn with_assignment(self, assignment: ShiftAssignment) -> Self {
        self.assignments.lock().push(assignment);
        self
    }

    /// Swap a stored shift definition. Callers must invalidate the resolver cache.
    pub fn replace_shift(&self, shift: ShiftDefinition) {
        let mut shifts = self.shifts.lock();
        shifts.retain(|s| s.id != shift.id);
        shifts.push(shift);
    }

    pub fn add_roster(&self, roster: RosterOverride) {
        self.rosters.lock().push(roster);
    }
}

#[async_trait]
impl ShiftRepository for MockShiftRepository {
    async fn assignments_for_user(&self, user: UserId) -> Result<Vec<ShiftAssignment>> {
        Ok(self.assignments.lock().iter().filter(|a| a.user == user).cloned().collect())
    }

    async fn roster_override(&self, user: UserId, date: NaiveDate) -> Result<Option<RosterOverride>> {
        Ok(self.rosters.lock().iter().find(|r| r.user == user && r.date == date).cloned())
    }

    async fn shift(&self, id: ShiftId) -> Result<Option<ShiftDefinition>> {
        Ok(self.shifts.lock().iter().find(|s| s.id == id).cloned())
    }

    async fn users_with_assignment_on(&self, date: NaiveDate) -> Result<Vec<UserId>> {
        let mut users: Vec<UserId> = self
            .assignments
            .lock()
            .iter()
            .filter(|a| a.validity.contains(date))
            .map(|a| a.user)
            .collect();
        users.sort_unstable();
        users.dedup();
        Ok(users)
    }
}

#[derive(Default)]
pub struct MockHolidayCalendar {
    holidays: Mutex<HashSet<NaiveDate>>,
}

impl MockHolidayCalendar {
    pub fn add(&self, date: NaiveDate) {
        self.holidays.lock().insert(date);
    }
}

#[async_trait]
impl HolidayCalendar for MockHolidayCalendar {
    async fn is_holiday(&self, _user: UserId, date: NaiveDate) -> Result<bool> {
        Ok(self.holidays.lock().contains(&date))
    }
}

// ---------------------------------------------------------------------------
// Timesheets
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TimesheetState {
    sheets: Vec<Timesheet>,
    entries: Vec<TimesheetEntry>,
    next_sheet: TimesheetId,
    next_entry: EntryId,
}

/// Timesheet store enforcing the `(user, shift, timing, date)` key.
pub struct MockTimesheetRepository {
    clock: MockClock,
    state: Mutex<TimesheetState>,
}

impl MockTimesheetRepository {
    pub fn new(clock: MockClock) -> Self {
        Self { clock, state: Mutex::new(TimesheetState::default()) }
    }

    pub fn sheets_for(&self, user: UserId) -> Vec<Timesheet> {
        self.state.lock().sheets.iter().filter(|s| s.user == user).cloned().collect()
    }

    pub fn live_entries(&self, timesheet: TimesheetId) -> Vec<TimesheetEntry> {
        let mut entries: Vec<TimesheetEntry> = self
            .state
            .lock()
            .entries
            .iter()
            .filter(|e| e.timesheet == timesheet && !e.is_deleted)
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.timestamp, e.id));
        entries
    }
}

#[async_trait]
impl TimesheetRepository for MockTimesheetRepository {
    async fn find(&self, id: TimesheetId) -> Result<Option<Timesheet>> {
        Ok(self.state.lock().sheets.iter().find(|s| s.id == id).cloned())
    }

    async fn find_by_key(&self, key: &TimesheetKey) -> Result<Option<Timesheet>> {
        Ok(self.state.lock().sheets.iter().find(|s| &s.key() == key).cloned())
    }

    async fn find_for_user_dates(&self, user: UserId, dates: &[NaiveDate]) -> Result<Vec<Timesheet>> {
        Ok(self
            .state
            .lock()
            .sheets
            .iter()
            .filter(|s| s.user == user && dates.contains(&s.date))
            .cloned()
            .collect())
    }

    async fn insert(&self, timesheet: NewTimesheet) -> Result<Timesheet> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if state.sheets.iter().any(|s| s.key() == timesheet.key()) {
            return Err(AttendanceError::IntegrityConflict(format!("duplicate timesheet {:?}", timesheet.key())));
        }
        state.next_sheet += 1;
        let sheet = Timesheet {
            id: state.next_sheet,
            user: timesheet.user,
            shift: timesheet.shift,
            timing: timesheet.timing,
            date: timesheet.date,
            schedule: timesheet.schedule,
            derived: Default::default(),
            created_at: now,
            updated_at: now,
        };
        state.sheets.push(sheet.clone());
        Ok(sheet)
    }

    async fn update_schedule(&self, id: TimesheetId, schedule: &ScheduleFields) -> Result<Timesheet> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let sheet = state
            .sheets
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AttendanceError::NotFound(format!("timesheet {id}")))?;
        sheet.schedule = schedule.clone();
        sheet.updated_at = now;
        Ok(sheet.clone())
    }

    async fn entries(&self, timesheet: TimesheetId) -> Result<Vec<TimesheetEntry>> {
        Ok(self.state.lock().entries.iter().filter(|e| e.timesheet == timesheet).cloned().collect())
    }

    async fn insert_entry(&self, entry: NewTimesheetEntry) -> Result<TimesheetEntry> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.next_entry += 1;
        let entry = TimesheetEntry {
            id: state.next_entry,
            timesheet: entry.timesheet,
            timestamp: entry.timestamp,
            method: entry.method,
            entry_type: entry.entry_type,
            category: entry.category,
            remark_category: entry.remark_category,
            remarks: entry.remarks,
            source_device: entry.source_device,
            is_deleted: false,
            created_at: now,
        };
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn find_entry(&self, id: EntryId) -> Result<Option<TimesheetEntry>> {
        Ok(self.state.lock().entries.iter().find(|e| e.id == id).cloned())
    }

    async fn soft_delete_entry(&self, id: EntryId) -> Result<bool> {
        let mut state = self.state.lock();
        match state.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if !entry.is_deleted => {
                entry.is_deleted = true;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(AttendanceError::NotFound(format!("entry {id}"))),
        }
    }

    async fn apply_recategorization(&self, recategorization: &Recategorization) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        for classification in &recategorization.entries {
            if let Some(entry) = state.entries.iter_mut().find(|e| e.id == classification.entry) {
                entry.entry_type = classification.entry_type;
                entry.category = classification.category;
            }
        }
        let sheet = state
            .sheets
            .iter_mut()
            .find(|s| s.id == recategorization.timesheet)
            .ok_or_else(|| AttendanceError::NotFound(format!("timesheet {}", recategorization.timesheet)))?;
        if sheet.derived != recategorization.derived {
            sheet.derived = recategorization.derived.clone();
            sheet.updated_at = now;
        }
        Ok(())
    }

    async fn modified_since(&self, since: DateTime<Utc>) -> Result<Vec<Timesheet>> {
        Ok(self.state.lock().sheets.iter().filter(|s| s.updated_at >= since).cloned().collect())
    }

    async fn for_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Timesheet>> {
        Ok(self
            .state
            .lock()
            .sheets
            .iter()
            .filter(|s| s.date >= start && s.date <= end)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Overtime
// ---------------------------------------------------------------------------

#[derive(Default)]
struct OvertimeState {
    settings: Vec<OvertimeSetting>,
    assigned: HashMap<UserId, OvertimeSettingId>,
    records: Vec<OvertimeRecord>,
    history: Vec<ClaimHistory>,
    next_entry: OvertimeEntryId,
    next_claim: ClaimId,
}

#[derive(Default)]
pub struct MockOvertimeRepository {
    state: Mutex<OvertimeState>,
}

impl MockOvertimeRepository {
    pub fn assign(&self, user: UserId, setting: OvertimeSetting) {
        let mut state = self.state.lock();
        state.assigned.insert(user, setting.id);
        state.settings.retain(|s| s.id != setting.id);
        state.settings.push(setting);
    }

    pub fn records(&self) -> Vec<OvertimeRecord> {
        self.state.lock().records.clone()
    }

    pub fn all_history(&self) -> Vec<ClaimHistory> {
        self.state.lock().history.clone()
    }

    /// Backdate a claim, as if it had been generated earlier.
    pub fn set_claim_created(&self, claim: ClaimId, at: DateTime<Utc>) {
        let mut state = self.state.lock();
        if let Some(record) = state.records.iter_mut().find(|r| r.claim.id == claim) {
            record.claim.created_at = at;
        }
    }

    fn build(state: &mut OvertimeState, overtime: NewOvertime) -> OvertimeRecord {
        state.next_entry += 1;
        state.next_claim += 1;
        let entry = OvertimeEntry {
            id: state.next_entry,
            user: overtime.user,
            setting: overtime.setting,
            timesheet: overtime.timesheet,
            detail: overtime.detail,
            created_at: overtime.created_at,
        };
        let claim = OvertimeClaim {
            id: state.next_claim,
            entry: entry.id,
            recipient: overtime.user,
            status: ClaimStatus::Unclaimed,
            description: overtime.remarks.clone(),
            is_archived: false,
            created_at: overtime.created_at,
            updated_at: overtime.created_at,
        };
        state.history.push(ClaimHistory {
            claim: claim.id,
            action: ClaimStatus::Unclaimed,
            actor: None,
            remarks: overtime.remarks,
            previous: None,
            current: Some(overtime.detail),
            created_at: overtime.created_at,
        });
        let record = OvertimeRecord { entry, claim };
        state.records.push(record.clone());
        record
    }
}

#[async_trait]
impl OvertimeRepository for MockOvertimeRepository {
    async fn setting_for_user(&self, user: UserId) -> Result<Option<OvertimeSetting>> {
        let state = self.state.lock();
        Ok(state.assigned.get(&user).and_then(|id| state.settings.iter().find(|s| s.id == *id)).cloned())
    }

    async fn setting(&self, id: OvertimeSettingId) -> Result<Option<OvertimeSetting>> {
        Ok(self.state.lock().settings.iter().find(|s| s.id == id).cloned())
    }

    async fn record_for_timesheet(&self, timesheet: TimesheetId) -> Result<Option<OvertimeRecord>> {
        Ok(self.state.lock().records.iter().find(|r| r.entry.timesheet == timesheet).cloned())
    }

    async fn claim(&self, id: ClaimId) -> Result<Option<OvertimeRecord>> {
        Ok(self.state.lock().records.iter().find(|r| r.claim.id == id).cloned())
    }

    async fn insert_generated(&self, overtime: NewOvertime) -> Result<OvertimeRecord> {
        let mut state = self.state.lock();
        if state.records.iter().any(|r| r.entry.timesheet == overtime.timesheet) {
            return Err(AttendanceError::IntegrityConflict(format!("overtime exists for {}", overtime.timesheet)));
        }
        Ok(Self::build(&mut state, overtime))
    }

    async fn replace_generated(
        &self,
        old: OvertimeEntryId,
        new: Option<NewOvertime>,
    ) -> Result<Option<OvertimeRecord>> {
        let mut state = self.state.lock();
        let removed: Vec<ClaimId> =
            state.records.iter().filter(|r| r.entry.id == old).map(|r| r.claim.id).collect();
        state.records.retain(|r| r.entry.id != old);
        state.history.retain(|h| !removed.contains(&h.claim));
        Ok(new.map(|overtime| Self::build(&mut state, overtime)))
    }

    async fn update_detail(
        &self,
        entry: OvertimeEntryId,
        detail: &OvertimeDetail,
        history: ClaimHistory,
    ) -> Result<OvertimeRecord> {
        let mut state = self.state.lock();
        let record = state
            .records
            .iter_mut()
            .find(|r| r.entry.id == entry)
            .ok_or_else(|| AttendanceError::NotFound(format!("overtime entry {entry}")))?;
        record.entry.detail = *detail;
        record.claim.updated_at = history.created_at;
        let updated = record.clone();
        state.history.push(history);
        Ok(updated)
    }

    async fn update_claim_status(
        &self,
        claim: ClaimId,
        status: ClaimStatus,
        history: ClaimHistory,
    ) -> Result<OvertimeRecord> {
        let mut state = self.state.lock();
        let record = state
            .records
            .iter_mut()
            .find(|r| r.claim.id == claim)
            .ok_or_else(|| AttendanceError::NotFound(format!("claim {claim}")))?;
        record.claim.status = status;
        record.claim.updated_at = history.created_at;
        let updated = record.clone();
        state.history.push(history);
        Ok(updated)
    }

    async fn unclaimed_claims(&self) -> Result<Vec<OvertimeRecord>> {
        Ok(self
            .state
            .lock()
            .records
            .iter()
            .filter(|r| r.claim.status == ClaimStatus::Unclaimed && !r.claim.is_archived)
            .cloned()
            .collect())
    }

    async fn archive_claims(&self, claims: &[ClaimId], history: Vec<ClaimHistory>) -> Result<usize> {
        let mut state = self.state.lock();
        let mut archived = 0;
        for record in state.records.iter_mut().filter(|r| claims.contains(&r.claim.id)) {
            record.claim.is_archived = true;
            archived += 1;
        }
        state.history.extend(history);
        Ok(archived)
    }

    async fn history(&self, claim: ClaimId) -> Result<Vec<ClaimHistory>> {
        Ok(self.state.lock().history.iter().filter(|h| h.claim == claim).cloned().collect())
    }
}

#[derive(Default)]
pub struct StaticCompensatoryRules {
    rules: HashMap<UserId, Vec<CompensatoryRule>>,
}

impl StaticCompensatoryRules {
    pub fn with_rules(mut self, user: UserId, rules: Vec<CompensatoryRule>) -> Self {
        self.rules.insert(user, rules);
        self
    }
}

#[async_trait]
impl CompensatoryRules for StaticCompensatoryRules {
    async fn rules_for(&self, user: UserId) -> Result<Option<Vec<CompensatoryRule>>> {
        Ok(self.rules.get(&user).cloned())
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockDeviceRepository {
    devices: Mutex<Vec<AttendanceDevice>>,
    maps: Mutex<Vec<BioUserMap>>,
}

impl MockDeviceRepository {
    pub fn add_device(&self, device: AttendanceDevice) {
        self.devices.lock().push(device);
    }

    pub fn map_bio(&self, device: DeviceId, bio_id: &str, user: UserId) {
        self.maps.lock().push(BioUserMap { device, bio_id: bio_id.to_string(), user });
    }

    pub fn get(&self, id: DeviceId) -> Option<AttendanceDevice> {
        self.devices.lock().iter().find(|d| d.id == id).cloned()
    }
}

#[async_trait]
impl DeviceRepository for MockDeviceRepository {
    async fn devices(&self) -> Result<Vec<AttendanceDevice>> {
        Ok(self.devices.lock().clone())
    }

    async fn device(&self, id: DeviceId) -> Result<Option<AttendanceDevice>> {
        Ok(self.get(id))
    }

    async fn device_by_serial(&self, serial_number: &str) -> Result<Option<AttendanceDevice>> {
        Ok(self.devices.lock().iter().find(|d| d.serial_number == serial_number).cloned())
    }

    async fn bio_user_map(&self, device: DeviceId) -> Result<Vec<BioUserMap>> {
        Ok(self.maps.lock().iter().filter(|m| m.device == device).cloned().collect())
    }

    async fn lookup_bio(&self, device: DeviceId, bio_id: &str) -> Result<Option<UserId>> {
        Ok(self.maps.lock().iter().find(|m| m.device == device && m.bio_id == bio_id).map(|m| m.user))
    }

    async fn update_cursor(&self, device: DeviceId, cursor: i64, at: DateTime<Utc>) -> Result<()> {
        if let Some(d) = self.devices.lock().iter_mut().find(|d| d.id == device) {
            d.last_pulled_id = cursor;
            d.failed_count = 0;
            d.last_activity = Some(at);
        }
        Ok(())
    }

    async fn record_failure(&self, device: DeviceId) -> Result<u32> {
        let mut devices = self.devices.lock();
        let d = devices
            .iter_mut()
            .find(|d| d.id == device)
            .ok_or_else(|| AttendanceError::NotFound(format!("device {device}")))?;
        d.failed_count += 1;
        Ok(d.failed_count)
    }

    async fn reset_failures(&self, device: DeviceId) -> Result<()> {
        if let Some(d) = self.devices.lock().iter_mut().find(|d| d.id == device) {
            d.failed_count = 0;
        }
        Ok(())
    }
}

/// Raw event cache, idempotent on `(device, bio_id, timestamp)`.
pub struct MockRawEventRepository {
    clock: MockClock,
    rows: Mutex<Vec<RawEvent>>,
}

impl MockRawEventRepository {
    pub fn new(clock: MockClock) -> Self {
        Self { clock, rows: Mutex::new(Vec::new()) }
    }

    pub fn rows(&self) -> Vec<RawEvent> {
        self.rows.lock().clone()
    }

    fn insert_row(&self, rows: &mut Vec<RawEvent>, event: &NewRawEvent) -> Option<RawEvent> {
        if rows
            .iter()
            .any(|r| r.device == event.device && r.bio_id == event.bio_id && r.timestamp == event.timestamp)
        {
            return None;
        }
        let row = RawEvent {
            id: rows.len() as RawEventId + 1,
            device: event.device,
            bio_id: event.bio_id.clone(),
            timestamp: event.timestamp,
            status: SyncStatus::Pending,
            attempts: 0,
            created_at: self.clock.now(),
        };
        rows.push(row.clone());
        Some(row)
    }

    fn set_status(&self, ids: &[RawEventId], status: SyncStatus) {
        for row in self.rows.lock().iter_mut().filter(|r| ids.contains(&r.id)) {
            row.status = status;
        }
    }
}

#[async_trait]
impl RawEventRepository for MockRawEventRepository {
    async fn insert_many(&self, events: &[NewRawEvent]) -> Result<usize> {
        let mut rows = self.rows.lock();
        Ok(events.iter().filter_map(|event| self.insert_row(&mut rows, event)).count())
    }

    async fn insert(&self, event: NewRawEvent) -> Result<Option<RawEvent>> {
        let mut rows = self.rows.lock();
        Ok(self.insert_row(&mut rows, &event))
    }

    async fn pending(&self, device: DeviceId) -> Result<Vec<RawEvent>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|r| r.device == device && r.status == SyncStatus::Pending)
            .cloned()
            .collect())
    }

    async fn mark_consumed(&self, ids: &[RawEventId]) -> Result<()> {
        self.set_status(ids, SyncStatus::Consumed);
        Ok(())
    }

    async fn mark_failed(&self, ids: &[RawEventId]) -> Result<()> {
        self.set_status(ids, SyncStatus::Failed);
        Ok(())
    }

    async fn bump_attempts(&self, ids: &[RawEventId]) -> Result<Vec<RawEvent>> {
        let mut rows = self.rows.lock();
        let mut bumped = Vec::new();
        for row in rows.iter_mut().filter(|r| ids.contains(&r.id)) {
            row.attempts += 1;
            bumped.push(row.clone());
        }
        Ok(bumped)
    }
}

/// Pull source serving a fixed event log. Devices listed in `failing`
/// answer with a transient error.
#[derive(Default)]
pub struct MockAttendanceSource {
    events: Mutex<HashMap<DeviceId, Vec<PulledEvent>>>,
    failing: Mutex<HashSet<DeviceId>>,
    fail_all: AtomicBool,
    pulls: AtomicUsize,
}

impl MockAttendanceSource {
    pub fn push_event(&self, device: DeviceId, external_id: i64, bio_id: &str, timestamp: DateTime<Utc>) {
        self.events
            .lock()
            .entry(device)
            .or_default()
            .push(PulledEvent { external_id, bio_id: bio_id.to_string(), timestamp });
    }

    pub fn fail_device(&self, device: DeviceId) {
        self.failing.lock().insert(device);
    }

    pub fn fail_all(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttendanceSource for MockAttendanceSource {
    async fn pull(&self, device: &AttendanceDevice, cursor: i64) -> Result<PullBatch> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) || self.failing.lock().contains(&device.id) {
            return Err(AttendanceError::TransientSync(format!("device {} unreachable", device.id)));
        }
        let events: Vec<PulledEvent> = self
            .events
            .lock()
            .get(&device.id)
            .map(|events| events.iter().filter(|e| e.external_id > cursor).cloned().collect())
            .unwrap_or_default();
        let next_cursor = events.iter().map(|e| e.external_id).max().unwrap_or(cursor);
        Ok(PullBatch { events, next_cursor })
    }
}

// ---------------------------------------------------------------------------
// Events and job state
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<AttendanceEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<AttendanceEvent> {
        self.events.lock().clone()
    }

    pub fn named(&self, name: &str) -> Vec<AttendanceEvent> {
        self.events.lock().iter().filter(|e| e.name() == name).cloned().collect()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, event: &AttendanceEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockJobStateRepository {
    watermarks: Mutex<HashMap<String, DateTime<Utc>>>,
}

#[async_trait]
impl JobStateRepository for MockJobStateRepository {
    async fn watermark(&self, job: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.watermarks.lock().get(job).copied())
    }

    async fn set_watermark(&self, job: &str, at: DateTime<Utc>) -> Result<()> {
        self.watermarks.lock().insert(job.to_string(), at);
        Ok(())
    }
}

/// Shorthand for the assignment target of tests.
pub fn shift_target(id: ShiftId) -> AssignmentTarget {
    AssignmentTarget::Shift(id)
}
