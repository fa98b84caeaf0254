//! Pure overtime arithmetic.
//!
//! Everything here works in seconds on an already categorized timesheet.
//! Setting fields are minutes and are scaled on read.

use timekeep_domain::{
    Coefficient, CompensatoryPolicy, CompensatoryRule, EditRejection, LeaveCoefficient,
    OvertimeApplicability, OvertimeDetail, OvertimeRate, OvertimeSetting, PolicyRejection,
    RateType, SlotRounding, Timesheet,
};

const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;

/// What a timesheet qualifies for under a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    Qualified { early: i64, late: i64 },
    Rejected(PolicyRejection),
}

/// The kind of day overtime is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    Workday,
    Offday,
    Holiday,
    FullLeave,
}

impl DayKind {
    pub fn of(sheet: &Timesheet) -> Self {
        match sheet.schedule.coefficient {
            Coefficient::Holiday => Self::Holiday,
            Coefficient::Offday => Self::Offday,
            Coefficient::Workday if sheet.schedule.leave_coefficient.is_full() => Self::FullLeave,
            Coefficient::Workday => Self::Workday,
        }
    }

    fn eligible(self, setting: &OvertimeSetting) -> bool {
        match self {
            Self::Workday => true,
            Self::Offday => setting.off_day_overtime,
            Self::Holiday => setting.paid_holiday_affect_overtime,
            Self::FullLeave => setting.leave_affect_overtime,
        }
    }

    fn compensatory_policy(self, setting: &OvertimeSetting) -> CompensatoryPolicy {
        match self {
            Self::Holiday => setting.overtime_after_holiday,
            Self::Offday => setting.overtime_after_offday,
            Self::Workday | Self::FullLeave => CompensatoryPolicy::GenerateBoth,
        }
    }
}

/// Trim `secs` to whole slots. Less than one slot trims to zero.
pub fn slot_trim(secs: i64, setting: &OvertimeSetting) -> i64 {
    let slot = setting.slot_duration_in_minutes * MINUTE;
    if !setting.calculate_overtime_in_slots || slot <= 0 {
        return secs;
    }
    let factor = secs / slot;
    let rem = secs % slot;
    if factor <= 0 || rem < 0 {
        return 0;
    }
    match setting.slot_behavior_for_remainder {
        SlotRounding::Up => slot * (factor + i64::from(rem > 0)),
        SlotRounding::Down => slot * factor,
        SlotRounding::Const => secs,
    }
}

#[derive(Debug, Clone, Copy)]
struct Sides {
    early: i64,
    late: i64,
    early_passes: bool,
    late_passes: bool,
}

fn workday_sides(sheet: &Timesheet, setting: &OvertimeSetting) -> Sides {
    let in_delta = sheet.derived.punch_in_delta_secs.unwrap_or(0);
    let out_delta = sheet.derived.punch_out_delta_secs.unwrap_or(0);

    let mut early = (-in_delta).max(0);
    let mut late = out_delta.max(0);

    if setting.require_dedicated_work_time {
        if in_delta > 0 {
            late -= in_delta;
        }
        if out_delta < 0 {
            early += out_delta;
        }
        let mut unpaid = sheet.derived.unpaid_break_secs;
        let from_early = unpaid.min(early.max(0));
        early -= from_early;
        unpaid -= from_early;
        late -= unpaid;
        early = early.max(0);
        late = late.max(0);
    }

    let before = setting.applicable_before * MINUTE;
    let after = setting.applicable_after * MINUTE;
    Sides {
        early,
        late,
        early_passes: early > 0 && early >= before,
        late_passes: late > 0 && late >= after,
    }
}

/// Early and late overtime of a sheet, before the flat reject check.
///
/// Non-working days report their whole worked span as early overtime.
pub fn early_late_overtime(sheet: &Timesheet, setting: &OvertimeSetting) -> (i64, i64) {
    if DayKind::of(sheet) != DayKind::Workday {
        let span = match (sheet.derived.punch_in, sheet.derived.punch_out) {
            (Some(punch_in), Some(punch_out)) => (punch_out - punch_in).num_seconds().max(0),
            _ => 0,
        };
        return (slot_trim(span, setting), 0);
    }

    let sides = workday_sides(sheet, setting);
    let early_q = (sides.early - setting.applicable_before * MINUTE).max(0);
    let late_q = (sides.late - setting.applicable_after * MINUTE).max(0);

    let (early_counts, late_counts) = match setting.overtime_applicable_only_after {
        OvertimeApplicability::Both => (sides.early_passes, sides.late_passes),
        OvertimeApplicability::Either => {
            let any = sides.early_passes || sides.late_passes;
            (any, any)
        }
    };

    let scope = setting.deduct_overtime_after_for;
    let early = match (early_counts, scope.reduces_punch_in()) {
        (false, _) => 0,
        (true, true) => early_q,
        (true, false) => sides.early,
    };
    let late = match (late_counts, scope.reduces_punch_out()) {
        (false, _) => 0,
        (true, true) => late_q,
        (true, false) => sides.late,
    };
    (slot_trim(early, setting), slot_trim(late, setting))
}

/// Overtime for an offday, holiday or full-leave day, after the compensatory
/// leave policy.
///
/// `compensatory` holds the rules of the user's compensatory leave account;
/// `None` means the user has no such account.
pub fn off_day_overtime(
    sheet: &Timesheet,
    setting: &OvertimeSetting,
    compensatory: Option<&[CompensatoryRule]>,
) -> i64 {
    let worked = sheet.derived.worked_secs.unwrap_or(0).max(0);
    let policy = DayKind::of(sheet).compensatory_policy(setting);

    let overtime = match (policy, compensatory) {
        (CompensatoryPolicy::GenerateBoth, _) | (_, None) => worked,
        (policy, Some(rules)) => {
            let granted = rules
                .iter()
                .filter(|rule| i64::from(rule.hours_in_off_day) * HOUR <= worked)
                .max_by(|a, b| a.balance_to_grant.total_cmp(&b.balance_to_grant));
            match (policy, granted) {
                (CompensatoryPolicy::NoOvertime, Some(_)) => 0,
                (CompensatoryPolicy::GenerateAfterDeduction, Some(rule)) => {
                    (worked - i64::from(rule.hours_in_off_day) * HOUR).max(0)
                }
                (CompensatoryPolicy::GenerateAfterDeduction, None) => 0,
                _ => worked,
            }
        }
    };
    slot_trim(overtime, setting)
}

/// Cap on claimable overtime for the sheet's kind of day, in seconds.
pub fn claimable_limit(sheet: &Timesheet, setting: &OvertimeSetting) -> Option<i64> {
    let minutes = match DayKind::of(sheet) {
        DayKind::Workday => setting.daily_overtime_limit,
        DayKind::Offday => setting.off_day_overtime_limit,
        DayKind::Holiday => setting.holiday_overtime_limit,
        DayKind::FullLeave => setting.leave_overtime_limit,
    };
    minutes.map(|minutes| minutes * MINUTE)
}

/// Rate types for the early and late side of a sheet.
///
/// A first-half leave pays early overtime at leave rates, a second-half
/// leave pays late overtime at leave rates.
pub fn rate_types_for(sheet: &Timesheet) -> (RateType, RateType) {
    match DayKind::of(sheet) {
        DayKind::Offday => (RateType::Offday, RateType::Offday),
        DayKind::Holiday => (RateType::Holiday, RateType::Holiday),
        DayKind::FullLeave => (RateType::Leave, RateType::Leave),
        DayKind::Workday => match sheet.schedule.leave_coefficient {
            LeaveCoefficient::FirstHalf => (RateType::Leave, RateType::Workday),
            LeaveCoefficient::SecondHalf => (RateType::Workday, RateType::Leave),
            _ => (RateType::Workday, RateType::Workday),
        },
    }
}

/// Scale `secs` by tiered rates: each tier pays its rate for the portion
/// above its threshold, the rest counts once.
pub fn normalize(secs: i64, rate_type: RateType, rates: &[OvertimeRate]) -> i64 {
    let mut tiers: Vec<&OvertimeRate> = rates.iter().filter(|rate| rate.rate_type == rate_type).collect();
    tiers.sort_by(|a, b| b.overtime_after_hours.cmp(&a.overtime_after_hours));

    let mut remaining = secs as f64;
    let mut normalized = 0.0;
    for tier in tiers {
        let after = f64::from(tier.overtime_after_hours) * HOUR as f64;
        if after <= remaining && remaining - after > 0.0 {
            normalized += tier.rate * (remaining - after);
            remaining = after;
        }
    }
    (normalized + remaining).round() as i64
}

/// Detail for qualified early/late overtime. The claim is capped by the
/// day's limit; late overtime is claimed before early overtime.
pub fn build_detail(sheet: &Timesheet, setting: &OvertimeSetting, early: i64, late: i64) -> OvertimeDetail {
    let total = early + late;
    let claimed = claimable_limit(sheet, setting).map_or(total, |limit| total.min(limit.max(0)));

    let late_claimed = late.min(claimed);
    let early_claimed = claimed - late_claimed;

    let (early_type, late_type) = rate_types_for(sheet);
    let normalized =
        normalize(early_claimed, early_type, &setting.rates) + normalize(late_claimed, late_type, &setting.rates);

    OvertimeDetail {
        punch_in_overtime_secs: early,
        punch_out_overtime_secs: late,
        claimed_secs: claimed,
        normalized_secs: normalized,
    }
}

/// Decide whether a sheet generates overtime.
pub fn assess(
    sheet: &Timesheet,
    setting: &OvertimeSetting,
    compensatory: Option<&[CompensatoryRule]>,
) -> Assessment {
    if sheet.derived.punch_in.is_none() || sheet.derived.punch_out.is_none() {
        return Assessment::Rejected(PolicyRejection::MissingPunches);
    }

    let kind = DayKind::of(sheet);
    if !kind.eligible(setting) {
        return Assessment::Rejected(PolicyRejection::NotEligible);
    }

    let (early, late) = if kind == DayKind::Workday {
        if sheet.expected_window().is_none() {
            return Assessment::Rejected(PolicyRejection::NotEligible);
        }
        let sides = workday_sides(sheet, setting);
        if !sides.early_passes && !sides.late_passes {
            return Assessment::Rejected(PolicyRejection::BelowThreshold);
        }
        early_late_overtime(sheet, setting)
    } else {
        (off_day_overtime(sheet, setting, compensatory), 0)
    };

    check_total(early, late, setting).map_or_else(Assessment::Rejected, |()| Assessment::Qualified { early, late })
}

fn check_total(early: i64, late: i64, setting: &OvertimeSetting) -> Result<(), PolicyRejection> {
    let total = early + late;
    if total <= 0 {
        return Err(PolicyRejection::BelowThreshold);
    }
    if total <= setting.flat_reject_value * MINUTE {
        return Err(PolicyRejection::AtOrBelowFlatReject);
    }
    Ok(())
}

/// Edits may only lower each side and must still clear the flat reject value.
pub fn validate_edit(
    current: &OvertimeDetail,
    punch_in_secs: i64,
    punch_out_secs: i64,
    setting: &OvertimeSetting,
) -> Result<(), EditRejection> {
    if punch_in_secs < 0
        || punch_out_secs < 0
        || punch_in_secs > current.punch_in_overtime_secs
        || punch_out_secs > current.punch_out_overtime_secs
    {
        return Err(EditRejection::UpwardEdit);
    }
    check_total(punch_in_secs, punch_out_secs, setting).map_err(|_| EditRejection::BelowThreshold)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use timekeep_domain::{
        DerivedFields, OvertimeCalculation, ReductionScope, ScheduleFields,
    };

    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    fn sheet(punch_in: DateTime<Utc>, punch_out: DateTime<Utc>) -> Timesheet {
        let expected_in = at(9, 0);
        let expected_out = at(18, 0);
        Timesheet {
            id: 1,
            user: 7,
            shift: Some(1),
            timing: Some(1),
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            schedule: ScheduleFields {
                expected_in: Some(expected_in),
                expected_out: Some(expected_out),
                coefficient: Coefficient::Workday,
                leave_coefficient: LeaveCoefficient::NoLeave,
                start_grace_secs: 600,
                end_grace_secs: 600,
                working_minutes: 540,
            },
            derived: DerivedFields {
                punch_in: Some(punch_in),
                punch_out: Some(punch_out),
                punch_in_delta_secs: Some((punch_in - expected_in).num_seconds()),
                punch_out_delta_secs: Some((punch_out - expected_out).num_seconds()),
                punctuality: Some(100.0),
                worked_secs: Some((punch_out - punch_in).num_seconds()),
                unpaid_break_secs: 0,
                is_present: true,
            },
            created_at: at(0, 0),
            updated_at: at(0, 0),
        }
    }

    fn offday(worked_hours: i64) -> Timesheet {
        let mut sheet = sheet(at(8, 0), at(8, 0) + Duration::hours(worked_hours));
        sheet.schedule.coefficient = Coefficient::Offday;
        sheet.schedule.expected_in = None;
        sheet.schedule.expected_out = None;
        sheet.derived.punch_in_delta_secs = None;
        sheet.derived.punch_out_delta_secs = None;
        sheet
    }

    fn setting() -> OvertimeSetting {
        OvertimeSetting { applicable_before: 30, flat_reject_value: 15, ..OvertimeSetting::default() }
    }

    #[test]
    fn forty_minutes_early_generates_forty() {
        let sheet = sheet(at(8, 20), at(18, 0));
        assert_eq!(assess(&sheet, &setting(), None), Assessment::Qualified { early: 40 * 60, late: 0 });
    }

    #[test]
    fn ten_minutes_early_is_below_threshold() {
        let sheet = sheet(at(8, 50), at(18, 0));
        assert_eq!(assess(&sheet, &setting(), None), Assessment::Rejected(PolicyRejection::BelowThreshold));
    }

    #[test]
    fn flat_reject_value_is_exclusive() {
        let setting = OvertimeSetting { applicable_after: 0, flat_reject_value: 15, ..OvertimeSetting::default() };

        let exactly = sheet(at(9, 0), at(18, 15));
        assert_eq!(assess(&exactly, &setting, None), Assessment::Rejected(PolicyRejection::AtOrBelowFlatReject));

        let above = sheet(at(9, 0), at(18, 16));
        assert_eq!(assess(&above, &setting, None), Assessment::Qualified { early: 0, late: 16 * 60 });
    }

    #[test]
    fn missing_punch_out_is_rejected() {
        let mut sheet = sheet(at(8, 0), at(18, 0));
        sheet.derived.punch_out = None;
        assert_eq!(assess(&sheet, &setting(), None), Assessment::Rejected(PolicyRejection::MissingPunches));
    }

    #[test]
    fn either_rule_lets_the_weak_side_count() {
        let base = OvertimeSetting { applicable_before: 30, applicable_after: 30, ..OvertimeSetting::default() };
        let sheet = sheet(at(8, 20), at(18, 10));

        let both = OvertimeSetting { overtime_applicable_only_after: OvertimeApplicability::Both, ..base.clone() };
        assert_eq!(early_late_overtime(&sheet, &both), (40 * 60, 0));

        let either = OvertimeSetting { overtime_applicable_only_after: OvertimeApplicability::Either, ..base };
        assert_eq!(early_late_overtime(&sheet, &either), (40 * 60, 10 * 60));
    }

    #[test]
    fn reduction_scope_deducts_thresholds() {
        let setting = OvertimeSetting {
            applicable_before: 30,
            applicable_after: 30,
            deduct_overtime_after_for: ReductionScope::PunchInOnly,
            ..OvertimeSetting::default()
        };
        let sheet = sheet(at(8, 20), at(18, 45));
        assert_eq!(early_late_overtime(&sheet, &setting), (10 * 60, 45 * 60));
    }

    #[test]
    fn dedicated_work_time_offsets_late_arrival() {
        let setting = OvertimeSetting { require_dedicated_work_time: true, ..OvertimeSetting::default() };
        let sheet = sheet(at(9, 20), at(19, 0));
        assert_eq!(early_late_overtime(&sheet, &setting), (0, 40 * 60));
    }

    #[test]
    fn dedicated_work_time_takes_unpaid_breaks_from_early_first() {
        let setting = OvertimeSetting { require_dedicated_work_time: true, ..OvertimeSetting::default() };
        let mut sheet = sheet(at(8, 30), at(18, 30));
        sheet.derived.unpaid_break_secs = 45 * 60;
        assert_eq!(early_late_overtime(&sheet, &setting), (0, 15 * 60));
    }

    #[test]
    fn slot_rounding() {
        let mut setting = OvertimeSetting {
            calculate_overtime_in_slots: true,
            slot_duration_in_minutes: 30,
            ..OvertimeSetting::default()
        };
        assert_eq!(slot_trim(70 * 60, &setting), 90 * 60);
        setting.slot_behavior_for_remainder = SlotRounding::Down;
        assert_eq!(slot_trim(70 * 60, &setting), 60 * 60);
        setting.slot_behavior_for_remainder = SlotRounding::Const;
        assert_eq!(slot_trim(70 * 60, &setting), 70 * 60);
        assert_eq!(slot_trim(20 * 60, &setting), 0);

        setting.calculate_overtime_in_slots = false;
        assert_eq!(slot_trim(20 * 60, &setting), 20 * 60);
    }

    #[test]
    fn offday_requires_the_policy_flag() {
        let sheet = offday(5);
        assert_eq!(assess(&sheet, &setting(), None), Assessment::Rejected(PolicyRejection::NotEligible));

        let enabled = OvertimeSetting { off_day_overtime: true, ..setting() };
        assert_eq!(assess(&sheet, &enabled, None), Assessment::Qualified { early: 5 * 3600, late: 0 });
    }

    #[test]
    fn compensatory_deduction_on_offdays() {
        let rules = [
            CompensatoryRule { hours_in_off_day: 4, balance_to_grant: 0.5 },
            CompensatoryRule { hours_in_off_day: 8, balance_to_grant: 1.0 },
        ];
        let sheet = offday(6);

        let deduct = OvertimeSetting {
            off_day_overtime: true,
            overtime_after_offday: CompensatoryPolicy::GenerateAfterDeduction,
            ..OvertimeSetting::default()
        };
        assert_eq!(off_day_overtime(&sheet, &deduct, Some(&rules)), 2 * 3600);

        let none = OvertimeSetting { overtime_after_offday: CompensatoryPolicy::NoOvertime, ..deduct.clone() };
        assert_eq!(off_day_overtime(&sheet, &none, Some(&rules)), 0);
        assert_eq!(off_day_overtime(&offday(3), &none, Some(&rules)), 3 * 3600);

        assert_eq!(off_day_overtime(&sheet, &deduct, None), 6 * 3600);
    }

    #[test]
    fn tiered_normalization() {
        let rates = [
            OvertimeRate { overtime_after_hours: 0, rate: 1.5, rate_type: RateType::Workday },
            OvertimeRate { overtime_after_hours: 2, rate: 2.0, rate_type: RateType::Workday },
            OvertimeRate { overtime_after_hours: 0, rate: 3.0, rate_type: RateType::Holiday },
        ];
        // 1h above 2h at 2.0, then 2h at 1.5
        assert_eq!(normalize(3 * 3600, RateType::Workday, &rates), 5 * 3600);
        assert_eq!(normalize(3600, RateType::Offday, &rates), 3600);
    }

    #[test]
    fn detail_caps_the_claim() {
        let setting = OvertimeSetting { daily_overtime_limit: Some(60), ..OvertimeSetting::default() };
        let sheet = sheet(at(8, 0), at(18, 30));
        let detail = build_detail(&sheet, &setting, 3600, 1800);
        assert_eq!(detail.punch_in_overtime_secs, 3600);
        assert_eq!(detail.punch_out_overtime_secs, 1800);
        assert_eq!(detail.claimed_secs, 3600);
        assert_eq!(detail.normalized_secs, 3600);
    }

    #[test]
    fn half_leave_uses_leave_rates_on_its_side() {
        let mut sheet = sheet(at(8, 0), at(18, 0));
        sheet.schedule.leave_coefficient = LeaveCoefficient::SecondHalf;
        assert_eq!(rate_types_for(&sheet), (RateType::Workday, RateType::Leave));
    }

    #[test]
    fn edits_only_go_down() {
        let current = OvertimeDetail {
            punch_in_overtime_secs: 40 * 60,
            punch_out_overtime_secs: 0,
            claimed_secs: 40 * 60,
            normalized_secs: 40 * 60,
        };
        let setting = OvertimeSetting {
            flat_reject_value: 15,
            overtime_calculation: OvertimeCalculation::Daily,
            ..OvertimeSetting::default()
        };
        assert_eq!(validate_edit(&current, 30 * 60, 0, &setting), Ok(()));
        assert_eq!(validate_edit(&current, 50 * 60, 0, &setting), Err(EditRejection::UpwardEdit));
        assert_eq!(validate_edit(&current, 15 * 60, 0, &setting), Err(EditRejection::BelowThreshold));
    }
}
