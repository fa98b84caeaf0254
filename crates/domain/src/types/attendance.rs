//! Attendance vocabulary
//!
//! Closed label sets shared by timesheets, entries and overtime. The labels
//! are the storage strings.

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// How a punch reached the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMethod {
    Device,
    #[serde(rename = "Web App")]
    WebApp,
    #[serde(rename = "Mobile App")]
    MobileApp,
    #[serde(rename = "RFID Card")]
    RfidCard,
    Password,
    #[serde(rename = "Att Adjustment")]
    AttAdjustment,
    Other,
    Import,
    #[serde(rename = "Travel Att")]
    TravelAtt,
    #[serde(rename = "Training Att")]
    TrainingAtt,
}

impl_domain_status_conversions!(EntryMethod {
    Device => "Device",
    WebApp => "Web App",
    MobileApp => "Mobile App",
    RfidCard => "RFID Card",
    Password => "Password",
    AttAdjustment => "Att Adjustment",
    Other => "Other",
    Import => "Import",
    TravelAtt => "Travel Att",
    TrainingAtt => "Training Att",
});

impl EntryMethod {
    /// Punches entered by HR after the fact. They never raise late alerts.
    pub const fn is_manual_override(&self) -> bool {
        matches!(self, Self::AttAdjustment | Self::Import)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    #[serde(rename = "Punch In")]
    PunchIn,
    #[serde(rename = "Punch Out")]
    PunchOut,
    #[serde(rename = "Break In")]
    BreakIn,
    #[serde(rename = "Break Out")]
    BreakOut,
    Unknown,
}

impl_domain_status_conversions!(EntryType {
    PunchIn => "Punch In",
    PunchOut => "Punch Out",
    BreakIn => "Break In",
    BreakOut => "Break Out",
    Unknown => "Unknown",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryCategory {
    #[default]
    Uncategorized,
    #[serde(rename = "Early In")]
    EarlyIn,
    #[serde(rename = "Timely In")]
    TimelyIn,
    #[serde(rename = "Late In")]
    LateIn,
    #[serde(rename = "Early Out")]
    EarlyOut,
    #[serde(rename = "Timely Out")]
    TimelyOut,
    #[serde(rename = "Late Out")]
    LateOut,
}

impl_domain_status_conversions!(EntryCategory {
    Uncategorized => "Uncategorized",
    EarlyIn => "Early In",
    TimelyIn => "Timely In",
    LateIn => "Late In",
    EarlyOut => "Early Out",
    TimelyOut => "Timely Out",
    LateOut => "Late Out",
});

/// Reason attached to a punch, mostly relevant for breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemarkCategory {
    #[serde(rename = "Tea Break")]
    TeaBreak,
    #[serde(rename = "Client Visit")]
    ClientVisit,
    #[serde(rename = "Lunch Break")]
    LunchBreak,
    Meeting,
    #[serde(rename = "Personal Break")]
    PersonalBreak,
    Others,
    #[serde(rename = "Punch In")]
    PunchIn,
    #[serde(rename = "Punch Out")]
    PunchOut,
}

impl_domain_status_conversions!(RemarkCategory {
    TeaBreak => "Tea Break",
    ClientVisit => "Client Visit",
    LunchBreak => "Lunch Break",
    Meeting => "Meeting",
    PersonalBreak => "Personal Break",
    Others => "Others",
    PunchIn => "Punch In",
    PunchOut => "Punch Out",
});

/// Kind of day a timesheet covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Coefficient {
    #[default]
    Workday,
    Offday,
    Holiday,
}

impl_domain_status_conversions!(Coefficient {
    Workday => "Workday",
    Offday => "Offday",
    Holiday => "Holiday",
});

impl Coefficient {
    /// Holiday beats offday beats workday.
    pub const fn derive(is_holiday: bool, has_workday: bool) -> Self {
        if is_holiday {
            Self::Holiday
        } else if !has_workday {
            Self::Offday
        } else {
            Self::Workday
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeaveCoefficient {
    #[default]
    #[serde(rename = "No Leave")]
    NoLeave,
    #[serde(rename = "First Half")]
    FirstHalf,
    #[serde(rename = "Second Half")]
    SecondHalf,
    #[serde(rename = "Full Leave")]
    FullLeave,
}

impl_domain_status_conversions!(LeaveCoefficient {
    NoLeave => "No Leave",
    FirstHalf => "First Half",
    SecondHalf => "Second Half",
    FullLeave => "Full Leave",
});

impl LeaveCoefficient {
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::FullLeave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_labels_parse_back() {
        assert_eq!("Att Adjustment".parse::<EntryMethod>(), Ok(EntryMethod::AttAdjustment));
        assert_eq!("rfid card".parse::<EntryMethod>(), Ok(EntryMethod::RfidCard));
        assert_eq!(LeaveCoefficient::FirstHalf.to_string(), "First Half");
        assert!("Half Leave".parse::<LeaveCoefficient>().is_err());
    }

    #[test]
    fn serde_uses_the_same_labels() {
        let json = serde_json::to_string(&EntryCategory::LateIn).unwrap();
        assert_eq!(json, "\"Late In\"");
        let back: RemarkCategory = serde_json::from_str("\"Personal Break\"").unwrap();
        assert_eq!(back, RemarkCategory::PersonalBreak);
    }

    #[test]
    fn holiday_has_priority_over_offday() {
        assert_eq!(Coefficient::derive(true, false), Coefficient::Holiday);
        assert_eq!(Coefficient::derive(true, true), Coefficient::Holiday);
        assert_eq!(Coefficient::derive(false, false), Coefficient::Offday);
        assert_eq!(Coefficient::derive(false, true), Coefficient::Workday);
    }

    #[test]
    fn only_adjustments_and_imports_are_manual() {
        assert!(EntryMethod::AttAdjustment.is_manual_override());
        assert!(EntryMethod::Import.is_manual_override());
        assert!(!EntryMethod::Device.is_manual_override());
        assert!(!EntryMethod::WebApp.is_manual_override());
    }
}
