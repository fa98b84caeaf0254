//! Attendance devices and the raw event cache

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeviceId, EntryMethod, EntryType, OrganizationId, RawEventId, RemarkCategory, UserId};
use crate::impl_domain_status_conversions;

/// How events leave a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMethod {
    /// Paginated pull from the device's local HTTP service.
    #[default]
    Adms,
    /// Pull from a replica of the vendor `checkinout` table.
    Checkinout,
    /// Device posts events to the push endpoint.
    Push,
}

impl_domain_status_conversions!(SyncMethod {
    Adms => "adms",
    Checkinout => "checkinout",
    Push => "push",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceDevice {
    pub id: DeviceId,
    pub organization: Option<OrganizationId>,
    pub serial_number: String,
    pub ip: String,
    pub port: u16,
    pub sync_method: SyncMethod,
    /// External pointer of the last row pulled.
    pub last_pulled_id: i64,
    pub failed_count: u32,
    pub last_activity: Option<DateTime<Utc>>,
}

impl AttendanceDevice {
    pub fn is_flagged(&self, max_failures: u32) -> bool {
        self.failed_count >= max_failures
    }

    pub fn lease_key(&self) -> String {
        format!("{}{}", crate::constants::DEVICE_SYNC_LEASE_PREFIX, self.id)
    }
}

/// Device-local user id mapped to an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BioUserMap {
    pub device: DeviceId,
    pub bio_id: String,
    pub user: UserId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Pending,
    Consumed,
    Failed,
}

impl_domain_status_conversions!(SyncStatus {
    Pending => "pending",
    Consumed => "consumed",
    Failed => "failed",
});

/// Cached punch pulled from or pushed by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: RawEventId,
    pub device: DeviceId,
    pub bio_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: SyncStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRawEvent {
    pub device: DeviceId,
    pub bio_id: String,
    pub timestamp: DateTime<Utc>,
}

/// One row from a pull source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulledEvent {
    pub external_id: i64,
    pub bio_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullBatch {
    pub events: Vec<PulledEvent>,
    /// Highest external id seen; equals the input cursor when nothing new.
    pub next_cursor: i64,
}

/// Body accepted by the device push endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePush {
    pub serial_number: String,
    pub bio_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_push_method")]
    pub entry_method: EntryMethod,
    #[serde(default)]
    pub entry_type: Option<EntryType>,
    #[serde(default)]
    pub remark_category: Option<RemarkCategory>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

fn default_push_method() -> EntryMethod {
    EntryMethod::Device
}
