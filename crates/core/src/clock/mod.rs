//! Punch ingestion

pub mod ingestion;
pub mod trim;

pub use ingestion::{ClockOutcome, ClockRequest, ClockService};
pub use trim::trim_timestamps;
