//! # Timekeep Infrastructure
//!
//! Infrastructure implementations of the attendance engine's ports.
//!
//! This crate contains:
//! - SQLite repositories for shifts, timesheets, overtime and devices
//! - Device pull clients (ADMS over HTTP, optional MySQL `checkinout` replica)
//! - The cron scheduler that runs the background jobs
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `timekeep-core`
//! - Depends on `timekeep-domain` and `timekeep-common`
//! - Contains all "impure" code (database, network, clocks, files)

pub mod config;
pub mod database;
pub mod devices;
pub mod errors;
pub mod http;
pub mod observability;
pub mod scheduling;

// Re-export commonly used items
pub use database::*;
pub use devices::*;
pub use errors::{InfraError, InfraResult};
pub use http::*;
pub use scheduling::{AttendanceScheduler, JobRunner, SchedulerError, SchedulerTimeouts};
