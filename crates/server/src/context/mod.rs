//! Application context - dependency injection container

use std::sync::Arc;

use timekeep_common::sync::KeyedLocks;
use timekeep_common::time::{Clock, SystemClock};
use timekeep_core::{
    ClockService, DevicePushHandler, DeviceSettings, DeviceSyncService, EngineSettings, EventSink,
    JobDispatcher, OvertimeService, ShiftRepository, ShiftResolver, TimesheetLifecycle,
    TimesheetRepository, TracingEventSink,
};
use timekeep_domain::{Config, Result, SyncMethod};
#[cfg(feature = "checkinout-replica")]
use timekeep_infra::CheckinoutReplica;
use timekeep_infra::{
    AdmsClient, AttendanceScheduler, DbManager, SqliteCompensatoryRules, SqliteDeviceRepository,
    SqliteHolidayCalendar, SqliteJobStateRepository, SqliteLeaseProvider, SqliteOvertimeRepository,
    SqliteRawEventRepository, SqliteShiftRepository, SqliteTimesheetRepository,
};
use tracing::info;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub settings: EngineSettings,
    pub lifecycle: Arc<TimesheetLifecycle>,
    pub ingestion: Arc<ClockService>,
    pub overtime: Arc<OvertimeService>,
    pub device_sync: Arc<DeviceSyncService>,
    pub push: Arc<DevicePushHandler>,
    pub jobs: Arc<JobDispatcher>,
}

impl AppContext {
    /// Open storage and wire every service on the system clock.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let settings = EngineSettings::from_config(&config.engine)?;

        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;

        let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);
        let locks = Arc::new(KeyedLocks::new());

        let shifts: Arc<dyn ShiftRepository> = Arc::new(SqliteShiftRepository::new(db.clone()));
        let timesheets: Arc<dyn TimesheetRepository> =
            Arc::new(SqliteTimesheetRepository::new(db.clone(), clock.clone()));
        let devices = Arc::new(SqliteDeviceRepository::new(db.clone()));
        let raw_events = Arc::new(SqliteRawEventRepository::new(db.clone(), clock.clone()));

        let resolver = Arc::new(ShiftResolver::new(
            shifts.clone(),
            Arc::new(SqliteHolidayCalendar::new(db.clone())),
            Arc::new(settings.clone()),
        ));
        let overtime = Arc::new(OvertimeService::new(
            timesheets.clone(),
            Arc::new(SqliteOvertimeRepository::new(db.clone())),
            Arc::new(SqliteCompensatoryRules::new(db.clone())),
            events.clone(),
            clock.clone(),
            settings.clone(),
            locks.clone(),
        ));
        let lifecycle = Arc::new(
            TimesheetLifecycle::new(
                resolver.clone(),
                timesheets.clone(),
                shifts,
                clock.clone(),
                locks.clone(),
            )
            .with_listener(overtime.clone())
            .with_events(events.clone()),
        );
        let ingestion = Arc::new(ClockService::new(
            lifecycle.clone(),
            resolver,
            timesheets,
            clock.clone(),
            locks,
        ));

        let sync = DeviceSyncService::new(
            devices.clone(),
            raw_events.clone(),
            Arc::new(SqliteLeaseProvider::new(db.clone(), clock.clone())),
            ingestion.clone(),
            events.clone(),
            clock.clone(),
            DeviceSettings::from(&config.devices),
        )
        .with_source(SyncMethod::Adms, Arc::new(AdmsClient::new(&config.devices)?));
        #[cfg(feature = "checkinout-replica")]
        let sync = match config.devices.checkinout_url {
            Some(_) => sync.with_source(
                SyncMethod::Checkinout,
                Arc::new(CheckinoutReplica::connect_lazy(&config.devices)?),
            ),
            None => sync,
        };
        let device_sync = Arc::new(sync);

        let push = Arc::new(DevicePushHandler::new(
            devices,
            raw_events,
            ingestion.clone(),
            events,
            config.devices.api_key.as_deref(),
        ));
        let jobs = Arc::new(JobDispatcher::new(
            lifecycle.clone(),
            overtime.clone(),
            device_sync.clone(),
            Arc::new(SqliteJobStateRepository::new(db.clone())),
            clock,
            settings.clone(),
        ));

        info!(
            db_path = %db.path().display(),
            timezone = %settings.timezone,
            "context.initialized"
        );

        Ok(Self { config, db, settings, lifecycle, ingestion, overtime, device_sync, push, jobs })
    }

    /// Build and start the cron scheduler, or `None` when disabled.
    pub async fn start_scheduler(&self) -> Result<Option<AttendanceScheduler>> {
        if !self.config.scheduler.enabled {
            info!("scheduler.disabled");
            return Ok(None);
        }

        let mut scheduler =
            AttendanceScheduler::new(&self.config.scheduler, self.settings.timezone, self.jobs.clone())
                .await?;
        scheduler.start().await?;
        info!(jobs = ?scheduler.jobs(), "scheduler.started");
        Ok(Some(scheduler))
    }
}
