//! Timesheet lifecycle and entry categorization

pub mod categorize;
pub mod lifecycle;
pub mod ports;

pub use categorize::{punctuality, recategorize, CategorizeContext};
pub use lifecycle::{EnsureOutcome, PopulationReport, TimesheetLifecycle};
pub use ports::{ScheduleChangeListener, TimesheetRepository};
