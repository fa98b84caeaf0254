//! Runs a [`JobKind`] against the engine services.

use std::sync::Arc;

use chrono::Duration;
use timekeep_common::time::Clock;
use timekeep_domain::{JobKind, Result};
use tracing::{info, instrument};

use super::ports::JobStateRepository;
use crate::devices::{DeviceSyncService, SyncAllReport};
use crate::overtime::{OvertimeService, SweepReport};
use crate::settings::EngineSettings;
use crate::timesheet::{PopulationReport, TimesheetLifecycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobReport {
    Population(PopulationReport),
    Sweep(SweepReport),
    Expired(usize),
    Sync(SyncAllReport),
}

pub struct JobDispatcher {
    lifecycle: Arc<TimesheetLifecycle>,
    overtime: Arc<OvertimeService>,
    devices: Arc<DeviceSyncService>,
    state: Arc<dyn JobStateRepository>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl JobDispatcher {
    pub fn new(
        lifecycle: Arc<TimesheetLifecycle>,
        overtime: Arc<OvertimeService>,
        devices: Arc<DeviceSyncService>,
        state: Arc<dyn JobStateRepository>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self { lifecycle, overtime, devices, state, clock, settings }
    }

    #[instrument(skip(self), fields(job = job.name()))]
    pub async fn dispatch(&self, job: &JobKind) -> Result<JobReport> {
        let now = self.clock.now();
        let today = self.settings.local_date(now);

        let report = match job {
            JobKind::PopulateTimesheets { date } => {
                JobReport::Population(self.lifecycle.populate(date.unwrap_or(today)).await?)
            }
            JobKind::DailyOvertimeSweep => {
                let since = self.state.watermark(job.name()).await?.unwrap_or(now - Duration::days(1));
                let report = self.overtime.sweep_daily(since).await?;
                // Failed sheets stay inside the next run's window.
                if report.failed == 0 {
                    self.state.set_watermark(job.name(), now).await?;
                }
                JobReport::Sweep(report)
            }
            JobKind::WeeklyOvertimeSweep { week_of } => {
                let week_of = week_of.unwrap_or(today - Duration::days(7));
                JobReport::Sweep(self.overtime.sweep_weekly(week_of).await?)
            }
            JobKind::FixMissingOvertime { ids } => JobReport::Sweep(self.overtime.fix_missing(ids).await?),
            JobKind::ExpireOvertimeClaims => JobReport::Expired(self.overtime.expire_claims(today).await?),
            JobKind::SyncDevices => JobReport::Sync(self.devices.sync_all().await?),
        };

        info!(job = job.name(), "job.completed");
        Ok(report)
    }
}
