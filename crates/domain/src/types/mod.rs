//! Domain types and models

pub mod attendance;
pub mod device;
pub mod events;
pub mod jobs;
pub mod overtime;
pub mod shift;
pub mod timesheet;

pub use attendance::*;
pub use device::*;
pub use events::*;
pub use jobs::*;
pub use overtime::*;
pub use shift::*;
pub use timesheet::*;

// ============================================================================
// Identifiers
// ============================================================================

pub type UserId = i64;
pub type OrganizationId = i64;
pub type ShiftId = i64;
pub type TimingId = i64;
pub type TimesheetId = i64;
pub type EntryId = i64;
pub type DeviceId = i64;
pub type RawEventId = i64;
pub type OvertimeSettingId = i64;
pub type OvertimeEntryId = i64;
pub type ClaimId = i64;
