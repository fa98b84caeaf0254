//! Device sync worker
//!
//! Pulls raw events into the cache under a per-device lease, then applies the
//! cached events of mapped employees through clock ingestion.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use timekeep_common::error::ErrorClassification;
use timekeep_common::time::Clock;
use timekeep_domain::{
    AttendanceDevice, AttendanceError, AttendanceEvent, DeviceId, EntryMethod, NewRawEvent,
    RawEvent, RawEventId, Result, SyncMethod, UserId,
};
use tracing::{debug, info, instrument, warn};

use super::ports::{AttendanceSource, DeviceRepository, LeaseProvider, RawEventRepository};
use crate::clock::{trim_timestamps, ClockRequest, ClockService};
use crate::events::{dispatch, EventSink};
use crate::settings::DeviceSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    LeaseHeld,
    Flagged,
    NoSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub pulled: usize,
    pub stored: usize,
    pub applied: usize,
    pub duplicates: usize,
    pub unmapped: usize,
    pub failed: usize,
}

impl SyncCounts {
    fn absorb(&mut self, other: &Self) {
        self.pulled += other.pulled;
        self.stored += other.stored;
        self.applied += other.applied;
        self.duplicates += other.duplicates;
        self.unmapped += other.unmapped;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReport {
    Skipped(SkipReason),
    Completed(SyncCounts),
}

/// Totals of a [`DeviceSyncService::sync_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncAllReport {
    pub devices: usize,
    pub completed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub counts: SyncCounts,
}

pub struct DeviceSyncService {
    devices: Arc<dyn DeviceRepository>,
    raw_events: Arc<dyn RawEventRepository>,
    sources: HashMap<SyncMethod, Arc<dyn AttendanceSource>>,
    leases: Arc<dyn LeaseProvider>,
    ingestion: Arc<ClockService>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    settings: DeviceSettings,
}

impl DeviceSyncService {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        raw_events: Arc<dyn RawEventRepository>,
        leases: Arc<dyn LeaseProvider>,
        ingestion: Arc<ClockService>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        settings: DeviceSettings,
    ) -> Self {
        Self {
            devices,
            raw_events,
            sources: HashMap::new(),
            leases,
            ingestion,
            events,
            clock,
            settings,
        }
    }

    /// Register the pull adapter for devices using `method`.
    pub fn with_source(mut self, method: SyncMethod, source: Arc<dyn AttendanceSource>) -> Self {
        self.sources.insert(method, source);
        self
    }

    /// Sync one device. A held lease or a flagged device skips the run.
    #[instrument(skip(self))]
    pub async fn sync(&self, device: DeviceId) -> Result<SyncReport> {
        let device = self
            .devices
            .device(device)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("attendance device {device}")))?;

        let Some(lease) = self.leases.acquire(&device.lease_key(), self.settings.lease_ttl).await? else {
            info!(device = device.id, "device_sync.skipped_lease_held");
            return Ok(SyncReport::Skipped(SkipReason::LeaseHeld));
        };

        let result = self.sync_leased(&device).await;

        if let Err(err) = self.leases.release(&lease).await {
            warn!(device = device.id, error = %err, "device_sync.release_failed");
        }
        result
    }

    /// Sync every device in turn. One device's failure never blocks the rest.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> Result<SyncAllReport> {
        let devices = self.devices.devices().await?;
        let mut report = SyncAllReport { devices: devices.len(), ..SyncAllReport::default() };

        for device in devices {
            match self.sync(device.id).await {
                Ok(SyncReport::Completed(counts)) => {
                    report.completed += 1;
                    report.counts.absorb(&counts);
                }
                Ok(SyncReport::Skipped(_)) => report.skipped += 1,
                Err(err) => {
                    report.errored += 1;
                    warn!(device = device.id, error = %err, kind = err.label(), "device_sync.failed");
                }
            }
        }

        info!(
            devices = report.devices,
            completed = report.completed,
            skipped = report.skipped,
            errored = report.errored,
            applied = report.counts.applied,
            "device_sync.all_completed"
        );
        Ok(report)
    }

    async fn sync_leased(&self, device: &AttendanceDevice) -> Result<SyncReport> {
        if device.is_flagged(self.settings.max_failures) {
            debug!(device = device.id, failed_count = device.failed_count, "device_sync.skipped_flagged");
            return Ok(SyncReport::Skipped(SkipReason::Flagged));
        }

        let mut counts = SyncCounts::default();
        if device.sync_method != SyncMethod::Push {
            let Some(source) = self.sources.get(&device.sync_method) else {
                warn!(device = device.id, method = %device.sync_method, "device_sync.no_source");
                return Ok(SyncReport::Skipped(SkipReason::NoSource));
            };
            self.pull(device, source.as_ref(), &mut counts).await?;
        }

        self.apply_pending(device, &mut counts).await?;
        info!(
            device = device.id,
            pulled = counts.pulled,
            stored = counts.stored,
            applied = counts.applied,
            unmapped = counts.unmapped,
            "device_sync.completed"
        );
        Ok(SyncReport::Completed(counts))
    }

    async fn pull(&self, device: &AttendanceDevice, source: &dyn AttendanceSource, counts: &mut SyncCounts) -> Result<()> {
        let pulled = tokio::time::timeout(self.settings.request_timeout, source.pull(device, device.last_pulled_id))
            .await
            .unwrap_or_else(|_| {
                Err(AttendanceError::TransientSync(format!(
                    "device {} did not answer within {:?}",
                    device.id, self.settings.request_timeout
                )))
            });

        let batch = match pulled {
            Ok(batch) => batch,
            Err(err) => {
                let failed_count = self.devices.record_failure(device.id).await?;
                warn!(device = device.id, failed_count, error = %err, "device_sync.pull_failed");
                if failed_count == self.settings.max_failures {
                    let event = AttendanceEvent::DeviceSyncFlagged { device: device.id, failed_count };
                    dispatch(self.events.as_ref(), std::slice::from_ref(&event)).await;
                }
                return Err(err);
            }
        };

        counts.pulled = batch.events.len();
        let rows: Vec<NewRawEvent> = batch
            .events
            .iter()
            .map(|event| NewRawEvent { device: device.id, bio_id: event.bio_id.clone(), timestamp: event.timestamp })
            .collect();
        counts.stored = self.raw_events.insert_many(&rows).await?;
        counts.duplicates += counts.pulled - counts.stored;

        if batch.next_cursor > device.last_pulled_id {
            self.devices.update_cursor(device.id, batch.next_cursor, self.clock.now()).await?;
        } else if device.failed_count > 0 {
            self.devices.reset_failures(device.id).await?;
        }
        Ok(())
    }

    async fn apply_pending(&self, device: &AttendanceDevice, counts: &mut SyncCounts) -> Result<()> {
        let mut pending = self.raw_events.pending(device.id).await?;
        if pending.is_empty() {
            return Ok(());
        }
        pending.sort_by_key(|event| event.timestamp);

        let mapping: HashMap<String, UserId> = self
            .devices
            .bio_user_map(device.id)
            .await?
            .into_iter()
            .map(|map| (map.bio_id, map.user))
            .collect();

        let mut kept = self.trimmed_batches(&pending, &mapping);
        let mut consumed: Vec<RawEventId> = Vec::new();
        let mut failed: Vec<RawEventId> = Vec::new();
        let mut unmapped: Vec<RawEventId> = Vec::new();

        for event in &pending {
            let Some(&user) = mapping.get(&event.bio_id) else {
                unmapped.push(event.id);
                continue;
            };
            let survives = kept
                .get_mut(&user)
                .is_some_and(|timestamps| timestamps.remove(&event.timestamp.trunc_subsecs(0)));
            if !survives {
                debug!(device = device.id, raw_event = event.id, user, "device_sync.trimmed");
                counts.duplicates += 1;
                consumed.push(event.id);
                continue;
            }
            let request = ClockRequest::new(user, event.timestamp, EntryMethod::Device).from_device(device.id);
            match self.ingestion.clock(request).await {
                Ok(outcome) => {
                    if outcome.duplicate {
                        counts.duplicates += 1;
                    } else {
                        counts.applied += 1;
                    }
                    consumed.push(event.id);
                    dispatch(self.events.as_ref(), &outcome.events).await;
                }
                Err(err) if err.is_retryable() => {
                    counts.failed += 1;
                    warn!(device = device.id, raw_event = event.id, error = %err, "device_sync.apply_retry");
                }
                Err(err) => {
                    counts.failed += 1;
                    failed.push(event.id);
                    warn!(device = device.id, raw_event = event.id, error = %err, "device_sync.apply_failed");
                }
            }
        }

        if !consumed.is_empty() {
            self.raw_events.mark_consumed(&consumed).await?;
        }
        if !failed.is_empty() {
            self.raw_events.mark_failed(&failed).await?;
        }
        if !unmapped.is_empty() {
            counts.unmapped = unmapped.len();
            let bumped = self.raw_events.bump_attempts(&unmapped).await?;
            self.flag_unmapped(device.id, &bumped).await;
        }
        Ok(())
    }

    /// Per mapped user, the timestamps left after trimming near-duplicate
    /// punches of one burst down to the latest.
    fn trimmed_batches(
        &self,
        pending: &[RawEvent],
        mapping: &HashMap<String, UserId>,
    ) -> HashMap<UserId, HashSet<DateTime<Utc>>> {
        let mut batches: HashMap<UserId, Vec<DateTime<Utc>>> = HashMap::new();
        for event in pending {
            if let Some(&user) = mapping.get(&event.bio_id) {
                batches.entry(user).or_default().push(event.timestamp);
            }
        }
        let tolerance = self.ingestion.dedup_tolerance();
        batches
            .into_iter()
            .map(|(user, timestamps)| (user, trim_timestamps(&timestamps, tolerance, true).into_iter().collect()))
            .collect()
    }

    /// Alert once per bio id, on the attempt that reaches the threshold.
    async fn flag_unmapped(&self, device: DeviceId, bumped: &[RawEvent]) {
        let mut bio_ids: Vec<String> = bumped
            .iter()
            .filter(|event| event.attempts == self.settings.max_unmapped_attempts)
            .map(|event| event.bio_id.clone())
            .collect();
        bio_ids.sort();
        bio_ids.dedup();
        if bio_ids.is_empty() {
            return;
        }
        warn!(device, bio_ids = ?bio_ids, "device_sync.unmapped_flagged");
        let event = AttendanceEvent::UnmappedBioIds { device, bio_ids };
        dispatch(self.events.as_ref(), std::slice::from_ref(&event)).await;
    }
}
