//! Overtime policy, entries and the claim workflow

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{ClaimId, OrganizationId, OvertimeEntryId, OvertimeSettingId, TimesheetId, UserId};
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OvertimeCalculation {
    #[default]
    Daily,
    Weekly,
}

impl_domain_status_conversions!(OvertimeCalculation {
    Daily => "daily",
    Weekly => "weekly",
});

/// How early and late thresholds combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OvertimeApplicability {
    /// Each side must pass its own threshold.
    #[default]
    Both,
    /// Either side passing makes both sides count.
    Either,
}

impl_domain_status_conversions!(OvertimeApplicability {
    Both => "both",
    Either => "either",
});

/// Sides whose threshold is deducted from the qualifying overtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionScope {
    PunchInOnly,
    PunchOutOnly,
    Both,
    #[default]
    Neither,
}

impl_domain_status_conversions!(ReductionScope {
    PunchInOnly => "punch_in_only",
    PunchOutOnly => "punch_out_only",
    Both => "both",
    Neither => "neither",
});

impl ReductionScope {
    pub const fn reduces_punch_in(&self) -> bool {
        matches!(self, Self::PunchInOnly | Self::Both)
    }

    pub const fn reduces_punch_out(&self) -> bool {
        matches!(self, Self::PunchOutOnly | Self::Both)
    }
}

/// Off-day overtime versus compensatory leave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensatoryPolicy {
    #[default]
    GenerateBoth,
    GenerateAfterDeduction,
    NoOvertime,
}

impl_domain_status_conversions!(CompensatoryPolicy {
    GenerateBoth => "generate_both",
    GenerateAfterDeduction => "generate_after_deduction",
    NoOvertime => "no_overtime",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryUnit {
    #[default]
    Days,
    Months,
    Years,
}

impl_domain_status_conversions!(ExpiryUnit {
    Days => "days",
    Months => "months",
    Years => "years",
});

impl ExpiryUnit {
    /// `date` moved forward by `amount` units. Month ends clamp.
    pub fn add_to(&self, date: NaiveDate, amount: u32) -> Option<NaiveDate> {
        match self {
            Self::Days => date.checked_add_days(Days::new(u64::from(amount))),
            Self::Months => date.checked_add_months(Months::new(amount)),
            Self::Years => date.checked_add_months(Months::new(amount.checked_mul(12)?)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotRounding {
    #[default]
    Up,
    Down,
    Const,
}

impl_domain_status_conversions!(SlotRounding {
    Up => "up",
    Down => "down",
    Const => "const",
});

/// Day kind an overtime rate applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateType {
    #[default]
    Workday,
    Offday,
    Holiday,
    Leave,
}

impl_domain_status_conversions!(RateType {
    Workday => "Workday",
    Offday => "Offday",
    Holiday => "Holiday",
    Leave => "Leave",
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OvertimeRate {
    pub overtime_after_hours: u32,
    pub rate: f64,
    pub rate_type: RateType,
}

/// Overtime policy knobs. Durations are minutes unless suffixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvertimeSetting {
    pub id: OvertimeSettingId,
    pub organization: OrganizationId,
    pub name: String,
    pub daily_overtime_limit: Option<i64>,
    pub off_day_overtime: bool,
    pub off_day_overtime_limit: Option<i64>,
    pub paid_holiday_affect_overtime: bool,
    pub holiday_overtime_limit: Option<i64>,
    pub leave_affect_overtime: bool,
    pub leave_overtime_limit: Option<i64>,
    pub applicable_before: i64,
    pub applicable_after: i64,
    pub overtime_applicable_only_after: OvertimeApplicability,
    pub deduct_overtime_after_for: ReductionScope,
    pub flat_reject_value: i64,
    pub require_dedicated_work_time: bool,
    pub calculate_overtime_in_slots: bool,
    pub slot_duration_in_minutes: i64,
    pub slot_behavior_for_remainder: SlotRounding,
    pub overtime_after_offday: CompensatoryPolicy,
    pub overtime_after_holiday: CompensatoryPolicy,
    pub claim_expires: bool,
    pub expires_after: u32,
    pub expires_after_unit: ExpiryUnit,
    pub overtime_calculation: OvertimeCalculation,
    pub rates: Vec<OvertimeRate>,
}

impl Default for OvertimeSetting {
    fn default() -> Self {
        Self {
            id: 0,
            organization: 0,
            name: "Default".to_string(),
            daily_overtime_limit: None,
            off_day_overtime: false,
            off_day_overtime_limit: None,
            paid_holiday_affect_overtime: true,
            holiday_overtime_limit: None,
            leave_affect_overtime: true,
            leave_overtime_limit: None,
            applicable_before: 0,
            applicable_after: 0,
            overtime_applicable_only_after: OvertimeApplicability::Both,
            deduct_overtime_after_for: ReductionScope::Neither,
            flat_reject_value: 0,
            require_dedicated_work_time: false,
            calculate_overtime_in_slots: false,
            slot_duration_in_minutes: 0,
            slot_behavior_for_remainder: SlotRounding::Up,
            overtime_after_offday: CompensatoryPolicy::GenerateBoth,
            overtime_after_holiday: CompensatoryPolicy::GenerateBoth,
            claim_expires: false,
            expires_after: 0,
            expires_after_unit: ExpiryUnit::Days,
            overtime_calculation: OvertimeCalculation::Daily,
            rates: Vec::new(),
        }
    }
}

/// Compensatory leave rule from the leave collaborator: working at least
/// `hours_in_off_day` on an off day grants `balance_to_grant` leave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompensatoryRule {
    pub hours_in_off_day: u32,
    pub balance_to_grant: f64,
}

/// Workflow status of an overtime claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    #[default]
    Unclaimed,
    Requested,
    Forwarded,
    Approved,
    Declined,
    Confirmed,
}

impl_domain_status_conversions!(ClaimStatus {
    Unclaimed => "Unclaimed",
    Requested => "Requested",
    Forwarded => "Forwarded",
    Approved => "Approved",
    Declined => "Declined",
    Confirmed => "Confirmed",
});

impl ClaimStatus {
    pub const fn can_transition_to(&self, next: ClaimStatus) -> bool {
        use ClaimStatus::*;
        matches!(
            (self, next),
            (Unclaimed, Requested)
                | (Requested, Forwarded | Approved | Declined)
                | (Forwarded, Forwarded | Approved | Declined)
                | (Declined, Requested)
                | (Approved, Confirmed)
        )
    }

    /// Claims still owned by the employee: editable and recalibratable.
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Unclaimed | Self::Declined)
    }
}

/// Early/late split plus the claimed and rate-normalized totals, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeDetail {
    pub punch_in_overtime_secs: i64,
    pub punch_out_overtime_secs: i64,
    pub claimed_secs: i64,
    pub normalized_secs: i64,
}

impl OvertimeDetail {
    pub const fn total_secs(&self) -> i64 {
        self.punch_in_overtime_secs + self.punch_out_overtime_secs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeEntry {
    pub id: OvertimeEntryId,
    pub user: UserId,
    pub setting: OvertimeSettingId,
    pub timesheet: TimesheetId,
    pub detail: OvertimeDetail,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeClaim {
    pub id: ClaimId,
    pub entry: OvertimeEntryId,
    pub recipient: UserId,
    pub status: ClaimStatus,
    pub description: String,
    /// Expired claims are archived and can no longer be acted on.
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimHistory {
    pub claim: ClaimId,
    pub action: ClaimStatus,
    pub actor: Option<UserId>,
    pub remarks: String,
    pub previous: Option<OvertimeDetail>,
    pub current: Option<OvertimeDetail>,
    pub created_at: DateTime<Utc>,
}

/// An entry together with its claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeRecord {
    pub entry: OvertimeEntry,
    pub claim: OvertimeClaim,
}

/// Everything written when overtime is generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOvertime {
    pub user: UserId,
    pub setting: OvertimeSettingId,
    pub timesheet: TimesheetId,
    pub detail: OvertimeDetail,
    pub remarks: String,
    pub created_at: DateTime<Utc>,
}

/// Normal negative outcome of overtime generation. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRejection {
    NotEligible,
    MissingPunches,
    BelowThreshold,
    AtOrBelowFlatReject,
    AlreadyExists,
    NoSetting,
}

impl_domain_status_conversions!(PolicyRejection {
    NotEligible => "not_eligible",
    MissingPunches => "missing_punches",
    BelowThreshold => "below_threshold",
    AtOrBelowFlatReject => "at_or_below_flat_reject",
    AlreadyExists => "already_exists",
    NoSetting => "no_setting",
});

/// Rejection of an employee's edit to claimed overtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditRejection {
    UpwardEdit,
    BelowThreshold,
}
