//! Entry categorization
//!
//! Pure re-derivation of entry types, punch categories, punctuality and
//! worked time from a timesheet's live entries. Safe to re-run: the entries
//! are re-sorted every time, so out-of-order arrival heals itself.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use timekeep_domain::{
    AttendanceEvent, DerivedFields, EntryCategory, EntryClassification, EntryType,
    Recategorization, RemarkCategory, Timesheet, TimesheetEntry,
};

/// Inputs besides the timesheet and its entries.
#[derive(Debug, Clone, Copy)]
pub struct CategorizeContext<'a> {
    /// Local "today"; late alerts are not raised for past dates.
    pub today: NaiveDate,
    pub unpaid_break_categories: &'a HashSet<RemarkCategory>,
}

/// Punctuality for a late arrival `deviation` past the grace window.
///
/// Scores `100 - min(100, minutes / 60 * 100 / 60)`, rounded to two decimals.
/// Three readings of this score disagree for a 09:15 arrival on a 09:00 shift
/// with ten minutes of grace:
/// - this formula on the five minutes past grace gives 99.86;
/// - the same formula on all fifteen minutes gives 98.61;
/// - the legacy score, 100/60 points lost per minute after the expected
///   punch-in with grace ignored, gives 75.0.
///
/// The first is implemented. Only late arrivals are scored; early and timely
/// ones get a flat 100.
pub fn punctuality(deviation: Duration) -> f64 {
    let minutes = deviation.num_seconds().max(0) as f64 / 60.0;
    let penalty = (minutes / 60.0 * (100.0 / 60.0)).min(100.0);
    round2(100.0 - penalty)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Re-derive everything categorization owns for `sheet`.
pub fn recategorize(
    sheet: &Timesheet,
    entries: &[TimesheetEntry],
    ctx: CategorizeContext<'_>,
) -> Recategorization {
    let mut live: Vec<&TimesheetEntry> = entries.iter().filter(|entry| !entry.is_deleted).collect();
    live.sort_by_key(|entry| (entry.timestamp, entry.id));

    let Some((first, rest)) = live.split_first() else {
        return Recategorization {
            timesheet: sheet.id,
            derived: DerivedFields::default(),
            entries: Vec::new(),
            events: Vec::new(),
        };
    };
    // Only the punch-in's previous category decides whether lateness is new.
    let was_late = first.category == EntryCategory::LateIn;
    let last = rest.last();
    let middle: &[&TimesheetEntry] = match rest.split_last() {
        Some((_, middle)) => middle,
        None => &[],
    };

    let mut classifications = Vec::with_capacity(live.len());
    let mut derived = DerivedFields {
        punch_in: Some(first.timestamp),
        punch_out: last.map(|entry| entry.timestamp),
        is_present: true,
        ..DerivedFields::default()
    };

    // Breaks pair consecutively as out/in; an odd trailing entry stays unknown.
    let mut unpaid = Duration::zero();
    let mut pairs = middle.chunks_exact(2);
    for pair in pairs.by_ref() {
        let (break_out, break_in) = (pair[0], pair[1]);
        classifications.push(classify(break_out, EntryType::BreakOut, EntryCategory::Uncategorized));
        classifications.push(classify(break_in, EntryType::BreakIn, EntryCategory::Uncategorized));
        let is_unpaid = break_out
            .remark_category
            .is_some_and(|category| ctx.unpaid_break_categories.contains(&category));
        if is_unpaid {
            unpaid = unpaid + (break_in.timestamp - break_out.timestamp).abs();
        }
    }
    for unpaired in pairs.remainder() {
        classifications.push(classify(unpaired, EntryType::Unknown, EntryCategory::Uncategorized));
    }
    derived.unpaid_break_secs = unpaid.num_seconds();

    if let Some(last) = last {
        let span = last.timestamp - first.timestamp;
        derived.worked_secs = Some((span - unpaid).num_seconds().max(0));
    }

    let schedule = &sheet.schedule;
    let window = sheet.expected_window().filter(|_| !sheet.is_non_working());

    let (in_category, out_category) = match window {
        None => (EntryCategory::Uncategorized, EntryCategory::Uncategorized),
        Some((expected_in, expected_out)) => {
            let start_grace = Duration::seconds(schedule.start_grace_secs);
            let end_grace = Duration::seconds(schedule.end_grace_secs);

            let in_category = if first.timestamp > expected_in + start_grace {
                EntryCategory::LateIn
            } else if first.timestamp < expected_in {
                EntryCategory::EarlyIn
            } else {
                EntryCategory::TimelyIn
            };
            derived.punch_in_delta_secs = Some((first.timestamp - expected_in).num_seconds());
            derived.punctuality = Some(match in_category {
                EntryCategory::LateIn => punctuality(first.timestamp - (expected_in + start_grace)),
                _ => 100.0,
            });

            let out_category = last.map_or(EntryCategory::Uncategorized, |last| {
                derived.punch_out_delta_secs = Some((last.timestamp - expected_out).num_seconds());
                if last.timestamp < expected_out - end_grace {
                    EntryCategory::EarlyOut
                } else if last.timestamp > expected_out {
                    EntryCategory::LateOut
                } else {
                    EntryCategory::TimelyOut
                }
            });
            (in_category, out_category)
        }
    };

    classifications.insert(0, classify(first, EntryType::PunchIn, in_category));
    if let Some(last) = last {
        classifications.push(classify(last, EntryType::PunchOut, out_category));
    }

    let mut events = Vec::new();
    let raises_late_alert = in_category == EntryCategory::LateIn
        && !was_late
        && sheet.date >= ctx.today
        && !first.method.is_manual_override();
    if raises_late_alert {
        events.push(AttendanceEvent::LateIn {
            user: sheet.user,
            timesheet: sheet.id,
            date: sheet.date,
            punch: first.timestamp,
        });
    }

    Recategorization { timesheet: sheet.id, derived, entries: classifications, events }
}

fn classify(entry: &TimesheetEntry, entry_type: EntryType, category: EntryCategory) -> EntryClassification {
    EntryClassification { entry: entry.id, entry_type, category }
}
