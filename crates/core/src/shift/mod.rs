//! Shift resolution: assignments, roster overrides and timing windows

pub mod interval_index;
pub mod ports;
pub mod resolver;

pub use interval_index::{IntervalIndex, IntervalOverlap};
pub use ports::{HolidayCalendar, NoHolidays, ShiftRepository};
pub use resolver::{DayPlan, Resolution, ShiftResolver, TimingWindow};
