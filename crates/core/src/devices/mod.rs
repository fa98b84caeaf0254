//! Device sync workers and push intake

pub mod lease;
pub mod ports;
pub mod push;
pub mod sync;

pub use lease::InMemoryLeaseProvider;
pub use ports::{AttendanceSource, DeviceRepository, Lease, LeaseProvider, RawEventRepository};
pub use push::{DevicePushHandler, PushOutcome};
pub use sync::{DeviceSyncService, SkipReason, SyncAllReport, SyncCounts, SyncReport};
