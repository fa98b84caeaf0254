//! Overtime generation engine

pub mod calculator;
pub mod ports;
pub mod service;

pub use calculator::{Assessment, DayKind};
pub use ports::{CompensatoryRules, NoCompensatoryLeave, OvertimeRepository};
pub use service::{EditOutcome, OvertimeOutcome, OvertimeService, RecalibrationOutcome, SweepReport};
