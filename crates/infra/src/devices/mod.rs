//! Attendance pull sources

pub mod adms;
#[cfg(feature = "checkinout-replica")]
pub mod checkinout;

pub use adms::AdmsClient;
#[cfg(feature = "checkinout-replica")]
pub use checkinout::CheckinoutReplica;
