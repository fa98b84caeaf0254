//! # Timekeep Domain
//!
//! Business domain types for the attendance timesheet and overtime engine.
//!
//! This crate contains:
//! - Shift, timesheet, overtime and device data types
//! - The [`AttendanceError`] taxonomy and [`Result`] alias
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - Depends only on `timekeep-common` (foundation tier)
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
