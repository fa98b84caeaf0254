//! Shift fixtures and a fully wired engine over in-memory ports.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use timekeep_common::sync::KeyedLocks;
use timekeep_common::time::MockClock;
use timekeep_core::{
    ClockService, DevicePushHandler, DeviceSettings, DeviceSyncService, EngineSettings,
    InMemoryLeaseProvider, JobDispatcher, OvertimeService, ShiftResolver, TimesheetLifecycle,
};
use timekeep_domain::{
    AttendanceDevice, DateRange, OvertimeSetting, ShiftAssignment, ShiftDefinition, ShiftId,
    SyncMethod, TimingId, UserId, WorkDay, WorkTiming,
};

use super::repositories::{
    shift_target, MockAttendanceSource, MockDeviceRepository, MockHolidayCalendar,
    MockJobStateRepository, MockOvertimeRepository, MockRawEventRepository, MockShiftRepository,
    MockTimesheetRepository, RecordingEventSink, StaticCompensatoryRules,
};

pub const DAY_WORKER: UserId = 1;
pub const NIGHT_WORKER: UserId = 2;
pub const DAY_SHIFT: ShiftId = 10;
pub const DAY_TIMING: TimingId = 11;
pub const NIGHT_SHIFT: ShiftId = 20;
pub const NIGHT_TIMING: TimingId = 21;
pub const API_KEY: &str = "device-secret";

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

/// UTC instant in 2024. The harness runs in UTC, so this is also local time.
pub fn at(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, hour, minute, 0).unwrap()
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn work_days(days: &[Weekday], timing: &WorkTiming) -> Vec<WorkDay> {
    days.iter()
        .map(|&day| WorkDay { day, validity: DateRange::open(date(1, 1)), timings: vec![timing.clone()] })
        .collect()
}

/// 09:00-18:00 Monday to Friday, ten minutes of grace both ways.
pub fn day_shift() -> ShiftDefinition {
    let timing = WorkTiming { id: DAY_TIMING, start_time: hm(9, 0), end_time: hm(18, 0), extends: false, working_minutes: 540 };
    ShiftDefinition {
        id: DAY_SHIFT,
        organization: 1,
        name: "Day".to_string(),
        start_time_grace_secs: 600,
        end_time_grace_secs: 600,
        work_days: work_days(&[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri], &timing),
    }
}

/// 21:00-06:00 every night.
pub fn night_shift() -> ShiftDefinition {
    let timing = WorkTiming { id: NIGHT_TIMING, start_time: hm(21, 0), end_time: hm(6, 0), extends: true, working_minutes: 540 };
    ShiftDefinition {
        id: NIGHT_SHIFT,
        organization: 1,
        name: "Night".to_string(),
        start_time_grace_secs: 600,
        end_time_grace_secs: 600,
        work_days: work_days(
            &[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri, Weekday::Sat, Weekday::Sun],
            &timing,
        ),
    }
}

pub fn assignment(id: i64, user: UserId, shift: ShiftId) -> ShiftAssignment {
    ShiftAssignment { id, user, target: shift_target(shift), validity: DateRange::open(date(1, 1)) }
}

/// 30 minutes of applicability on both sides, no caps.
pub fn overtime_setting() -> OvertimeSetting {
    OvertimeSetting {
        id: 1,
        organization: 1,
        name: "Standard".to_string(),
        applicable_before: 30,
        applicable_after: 30,
        ..OvertimeSetting::default()
    }
}

pub fn device(id: i64, serial_number: &str, sync_method: SyncMethod) -> AttendanceDevice {
    AttendanceDevice {
        id,
        organization: Some(1),
        serial_number: serial_number.to_string(),
        ip: "10.0.0.10".to_string(),
        port: 8081,
        sync_method,
        last_pulled_id: 0,
        failed_count: 0,
        last_activity: None,
    }
}

pub fn device_settings() -> DeviceSettings {
    DeviceSettings {
        lease_ttl: StdDuration::from_secs(720),
        request_timeout: StdDuration::from_secs(5),
        max_failures: 3,
        max_unmapped_attempts: 2,
    }
}

/// Every service wired over the in-memory ports, in UTC.
pub struct Harness {
    pub clock: MockClock,
    pub shifts: Arc<MockShiftRepository>,
    pub holidays: Arc<MockHolidayCalendar>,
    pub timesheets: Arc<MockTimesheetRepository>,
    pub overtime_store: Arc<MockOvertimeRepository>,
    pub devices: Arc<MockDeviceRepository>,
    pub raw_events: Arc<MockRawEventRepository>,
    pub source: Arc<MockAttendanceSource>,
    pub leases: Arc<InMemoryLeaseProvider>,
    pub events: Arc<RecordingEventSink>,
    pub lifecycle: Arc<TimesheetLifecycle>,
    pub ingestion: Arc<ClockService>,
    pub overtime: Arc<OvertimeService>,
    pub sync: Arc<DeviceSyncService>,
    pub push: DevicePushHandler,
    pub jobs: JobDispatcher,
}

impl Harness {
    /// Day worker on the day shift, night worker on the night shift.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_compensatory(now, StaticCompensatoryRules::default())
    }

    pub fn with_compensatory(now: DateTime<Utc>, compensatory: StaticCompensatoryRules) -> Self {
        let clock = MockClock::at(now);
        let settings = EngineSettings::default();
        let locks = Arc::new(KeyedLocks::new());

        let shifts = Arc::new(
            MockShiftRepository::default()
                .with_shift(day_shift())
                .with_shift(night_shift())
                .with_assignment(assignment(1, DAY_WORKER, DAY_SHIFT))
                .with_assignment(assignment(2, NIGHT_WORKER, NIGHT_SHIFT)),
        );
        let holidays = Arc::new(MockHolidayCalendar::default());
        let timesheets = Arc::new(MockTimesheetRepository::new(clock.clone()));
        let overtime_store = Arc::new(MockOvertimeRepository::default());
        let devices = Arc::new(MockDeviceRepository::default());
        let raw_events = Arc::new(MockRawEventRepository::new(clock.clone()));
        let source = Arc::new(MockAttendanceSource::default());
        let leases = Arc::new(InMemoryLeaseProvider::new(Arc::new(clock.clone())));
        let events = Arc::new(RecordingEventSink::default());
        let job_state = Arc::new(MockJobStateRepository::default());

        let resolver = Arc::new(ShiftResolver::new(shifts.clone(), holidays.clone(), Arc::new(settings.clone())));
        let overtime = Arc::new(OvertimeService::new(
            timesheets.clone(),
            overtime_store.clone(),
            Arc::new(compensatory),
            events.clone(),
            Arc::new(clock.clone()),
            settings.clone(),
            locks.clone(),
        ));
        let lifecycle = Arc::new(
            TimesheetLifecycle::new(
                resolver.clone(),
                timesheets.clone(),
                shifts.clone(),
                Arc::new(clock.clone()),
                locks.clone(),
            )
            .with_listener(overtime.clone())
            .with_events(events.clone()),
        );
        let ingestion = Arc::new(ClockService::new(
            lifecycle.clone(),
            resolver,
            timesheets.clone(),
            Arc::new(clock.clone()),
            locks,
        ));
        let sync = Arc::new(
            DeviceSyncService::new(
                devices.clone(),
                raw_events.clone(),
                leases.clone(),
                ingestion.clone(),
                events.clone(),
                Arc::new(clock.clone()),
                device_settings(),
            )
            .with_source(SyncMethod::Adms, source.clone()),
        );
        let push = DevicePushHandler::new(
            devices.clone(),
            raw_events.clone(),
            ingestion.clone(),
            events.clone(),
            Some(API_KEY),
        );
        let jobs = JobDispatcher::new(
            lifecycle.clone(),
            overtime.clone(),
            sync.clone(),
            job_state,
            Arc::new(clock.clone()),
            settings,
        );

        Self {
            clock,
            shifts,
            holidays,
            timesheets,
            overtime_store,
            devices,
            raw_events,
            source,
            leases,
            events,
            lifecycle,
            ingestion,
            overtime,
            sync,
            push,
            jobs,
        }
    }
}
