//! Port interfaces for device sync

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use timekeep_domain::{
    AttendanceDevice, BioUserMap, DeviceId, NewRawEvent, PullBatch, RawEvent, RawEventId, Result,
    UserId,
};

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn devices(&self) -> Result<Vec<AttendanceDevice>>;

    async fn device(&self, id: DeviceId) -> Result<Option<AttendanceDevice>>;

    async fn device_by_serial(&self, serial_number: &str) -> Result<Option<AttendanceDevice>>;

    async fn bio_user_map(&self, device: DeviceId) -> Result<Vec<BioUserMap>>;

    async fn lookup_bio(&self, device: DeviceId, bio_id: &str) -> Result<Option<UserId>>;

    /// Advance the pull cursor and reset the failure counter.
    async fn update_cursor(&self, device: DeviceId, cursor: i64, at: DateTime<Utc>) -> Result<()>;

    /// Increment the failure counter and return its new value.
    async fn record_failure(&self, device: DeviceId) -> Result<u32>;

    async fn reset_failures(&self, device: DeviceId) -> Result<()>;
}

/// The raw event cache.
#[async_trait]
pub trait RawEventRepository: Send + Sync {
    /// Insert-or-ignore on `(device, bio_id, timestamp)`; returns the number
    /// of new rows.
    async fn insert_many(&self, events: &[NewRawEvent]) -> Result<usize>;

    /// `None` when the event is already cached.
    async fn insert(&self, event: NewRawEvent) -> Result<Option<RawEvent>>;

    async fn pending(&self, device: DeviceId) -> Result<Vec<RawEvent>>;

    async fn mark_consumed(&self, ids: &[RawEventId]) -> Result<()>;

    async fn mark_failed(&self, ids: &[RawEventId]) -> Result<()>;

    /// Increment `attempts` and return the updated rows.
    async fn bump_attempts(&self, ids: &[RawEventId]) -> Result<Vec<RawEvent>>;
}

/// Somewhere attendance events can be pulled from.
#[async_trait]
pub trait AttendanceSource: Send + Sync {
    /// Events after `cursor`. Unreachable sources are `TransientSync`.
    async fn pull(&self, device: &AttendanceDevice, cursor: i64) -> Result<PullBatch>;
}

/// Granted exclusive lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub key: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Time-boxed exclusive leases. The backend owns expiry.
#[async_trait]
pub trait LeaseProvider: Send + Sync {
    /// `None` while another holder's lease is unexpired.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>>;

    /// Release only if `lease` is still the current holder.
    async fn release(&self, lease: &Lease) -> Result<()>;
}
