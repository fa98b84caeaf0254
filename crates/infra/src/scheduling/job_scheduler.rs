//! Cron-driven runner for the typed attendance jobs.
//!
//! One cron entry is registered per [`JobKind`] from [`SchedulerConfig`].
//! Every tick spawns the job on its own task and waits for it up to the job
//! timeout. A job that overruns is never aborted: it keeps its running flag
//! until it finishes, and ticks arriving in the meantime are skipped with
//! `job.skipped_overlap`.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use timekeep_domain::SchedulerConfig;
//! use timekeep_infra::scheduling::{AttendanceScheduler, JobRunner, SchedulerResult};
//!
//! # async fn example(runner: Arc<dyn JobRunner>) -> SchedulerResult<()> {
//! let mut scheduler =
//!     AttendanceScheduler::new(&SchedulerConfig::default(), chrono_tz::UTC, runner).await?;
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono_tz::Tz;
use timekeep_core::JobDispatcher;
use timekeep_domain::{JobKind, Result, SchedulerConfig};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Executes one job. Implemented by [`JobDispatcher`]; tests supply their own.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &JobKind) -> Result<()>;
}

#[async_trait]
impl JobRunner for JobDispatcher {
    async fn run(&self, job: &JobKind) -> Result<()> {
        let report = self.dispatch(job).await?;
        info!(job = job.name(), report = ?report, "job.report");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerTimeouts {
    pub job: Duration,
    pub start: Duration,
    pub stop: Duration,
    pub join: Duration,
}

impl Default for SchedulerTimeouts {
    fn default() -> Self {
        Self {
            job: Duration::from_secs(timekeep_domain::constants::DEFAULT_JOB_TIMEOUT_SECS),
            start: Duration::from_secs(5),
            stop: Duration::from_secs(5),
            join: Duration::from_secs(30),
        }
    }
}

/// Cron schedules per job; empty expressions leave the job unscheduled.
fn schedules(config: &SchedulerConfig) -> Vec<(JobKind, String)> {
    [
        (JobKind::PopulateTimesheets { date: None }, &config.populate_timesheets),
        (JobKind::DailyOvertimeSweep, &config.daily_overtime_sweep),
        (JobKind::WeeklyOvertimeSweep { week_of: None }, &config.weekly_overtime_sweep),
        (JobKind::ExpireOvertimeClaims, &config.expire_overtime_claims),
        (JobKind::SyncDevices, &config.sync_devices),
    ]
    .into_iter()
    .filter(|(_, cron)| !cron.trim().is_empty())
    .map(|(job, cron)| (job, cron.trim().to_owned()))
    .collect()
}

pub struct AttendanceScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    timeouts: SchedulerTimeouts,
    running: HashMap<&'static str, Arc<AtomicBool>>,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl AttendanceScheduler {
    pub async fn new(config: &SchedulerConfig, timezone: Tz, runner: Arc<dyn JobRunner>) -> SchedulerResult<Self> {
        let timeouts = SchedulerTimeouts {
            job: Duration::from_secs(config.job_timeout_secs.max(1)),
            ..SchedulerTimeouts::default()
        };
        Self::with_schedules(schedules(config), timezone, runner, timeouts).await
    }

    /// Build from explicit `(job, cron)` pairs.
    pub async fn with_schedules(
        schedules: Vec<(JobKind, String)>,
        timezone: Tz,
        runner: Arc<dyn JobRunner>,
        timeouts: SchedulerTimeouts,
    ) -> SchedulerResult<Self> {
        let raw_scheduler =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;

        let mut scheduler = Self {
            scheduler: Arc::new(RwLock::new(raw_scheduler)),
            timeouts,
            running: HashMap::new(),
            monitor_handle: None,
            cancellation: CancellationToken::new(),
        };
        for (job, cron) in schedules {
            scheduler.register(job, &cron, timezone, runner.clone()).await?;
        }
        Ok(scheduler)
    }

    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.cancellation = CancellationToken::new();

        let scheduler = self.scheduler.clone();
        let start_timeout = self.timeouts.start;
        tokio::time::timeout(start_timeout, async move { scheduler.write().await.start().await })
            .await
            .map_err(|_| SchedulerError::Timeout { duration: start_timeout })?
            .map_err(|source| SchedulerError::StartFailed { source })?;

        let cancel = self.cancellation.clone();
        self.monitor_handle = Some(tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("scheduler.monitor_cancelled");
        }));

        info!(jobs = self.running.len(), "scheduler.started");
        Ok(())
    }

    /// Stop firing new ticks and wait for in-flight jobs to drain.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }
        self.cancellation.cancel();

        let scheduler = self.scheduler.clone();
        let stop_timeout = self.timeouts.stop;
        tokio::time::timeout(stop_timeout, async move { scheduler.write().await.shutdown().await })
            .await
            .map_err(|_| SchedulerError::Timeout { duration: stop_timeout })?
            .map_err(|source| SchedulerError::StopFailed { source })?;

        let join_timeout = self.timeouts.join;
        if let Some(handle) = self.monitor_handle.take() {
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { duration: join_timeout })?
                .map_err(|source| SchedulerError::TaskJoinFailed { source })?;
        }
        tokio::time::timeout(join_timeout, self.wait_idle())
            .await
            .map_err(|_| SchedulerError::Timeout { duration: join_timeout })?;

        info!("scheduler.stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Names of the registered jobs.
    pub fn jobs(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.running.keys().copied().collect();
        names.sort_unstable();
        names
    }

    async fn wait_idle(&self) {
        while self.running.values().any(|flag| flag.load(Ordering::SeqCst)) {
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    async fn register(
        &mut self,
        job: JobKind,
        cron: &str,
        timezone: Tz,
        runner: Arc<dyn JobRunner>,
    ) -> SchedulerResult<()> {
        let name = job.name();
        let flag = Arc::new(AtomicBool::new(false));
        let tick_flag = flag.clone();
        let job_timeout = self.timeouts.job;
        let job = Arc::new(job);

        let definition = Job::new_async_tz(cron, timezone, move |_id, _lock| {
            let flag = tick_flag.clone();
            let runner = runner.clone();
            let job = job.clone();

            Box::pin(async move {
                if flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
                    warn!(job = name, "job.skipped_overlap");
                    return;
                }

                let started = Instant::now();
                let task_flag = flag.clone();
                let handle = tokio::spawn(async move {
                    let outcome = runner.run(&job).await;
                    task_flag.store(false, Ordering::SeqCst);
                    outcome
                });

                match tokio::time::timeout(job_timeout, handle).await {
                    Ok(Ok(Ok(()))) => {
                        debug!(job = name, elapsed_ms = started.elapsed().as_millis() as u64, "job.finished");
                    }
                    Ok(Ok(Err(err))) => {
                        error!(job = name, error = %err, "job.failed");
                    }
                    Ok(Err(join_err)) => {
                        flag.store(false, Ordering::SeqCst);
                        error!(job = name, error = %join_err, "job.panicked");
                    }
                    Err(_) => {
                        warn!(job = name, timeout_secs = job_timeout.as_secs(), "job.timed_out");
                    }
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { job: name, source })?;

        self.scheduler
            .write()
            .await
            .add(definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { job: name, source })?;

        debug!(job = name, cron, "scheduler.job_registered");
        self.running.insert(name, flag);
        Ok(())
    }
}

impl Drop for AttendanceScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("scheduler.dropped_while_running");
            self.cancellation.cancel();
        }
    }
}
