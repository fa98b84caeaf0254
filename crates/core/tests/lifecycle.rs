//! Timesheet lifecycle: ensure, population and the leave overlay.

mod support;

use chrono::NaiveTime;
use support::fixtures::{
    at, date, day_shift, Harness, DAY_SHIFT, DAY_TIMING, DAY_WORKER, NIGHT_SHIFT, NIGHT_TIMING,
    NIGHT_WORKER,
};
use timekeep_core::ClockRequest;
use timekeep_domain::{AttendanceEvent, Coefficient, EntryMethod, LeaveCoefficient, RosterOverride};

#[tokio::test]
async fn ensure_timesheet_is_idempotent() {
    let h = Harness::new(at(3, 4, 7, 0));

    let first = h.lifecycle.ensure_timesheet(DAY_WORKER, date(3, 4)).await.unwrap();
    let second = h.lifecycle.ensure_timesheet(DAY_WORKER, date(3, 4)).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert!(second.changed.is_empty());
    assert_eq!(first.timesheet.id, second.timesheet.id);
    assert_eq!(h.timesheets.sheets_for(DAY_WORKER).len(), 1);

    let sheet = second.timesheet;
    assert_eq!(sheet.shift, Some(DAY_SHIFT));
    assert_eq!(sheet.timing, Some(DAY_TIMING));
    assert_eq!(sheet.schedule.coefficient, Coefficient::Workday);
    assert_eq!(sheet.expected_window(), Some((at(3, 4, 9, 0), at(3, 4, 18, 0))));
    assert_eq!(sheet.schedule.working_minutes, 540);
}

#[tokio::test]
async fn weekend_without_timings_is_an_offday_sheet() {
    let h = Harness::new(at(3, 9, 7, 0));

    let sheet = h.lifecycle.ensure_timesheet(DAY_WORKER, date(3, 9)).await.unwrap().timesheet;

    assert_eq!(sheet.schedule.coefficient, Coefficient::Offday);
    assert_eq!(sheet.timing, None);
    assert_eq!(sheet.expected_window(), None);
    assert_eq!(sheet.schedule.working_minutes, 0);
}

#[tokio::test]
async fn holiday_takes_priority_over_workday() {
    let h = Harness::new(at(3, 5, 7, 0));
    h.holidays.add(date(3, 5));

    let sheet = h.lifecycle.ensure_timesheet(DAY_WORKER, date(3, 5)).await.unwrap().timesheet;

    assert_eq!(sheet.schedule.coefficient, Coefficient::Holiday);
    assert!(sheet.expected_window().is_some());
}

#[tokio::test]
async fn overnight_sheet_ends_on_the_next_morning() {
    let h = Harness::new(at(3, 4, 7, 0));

    let sheet = h.lifecycle.ensure_timesheet(NIGHT_WORKER, date(3, 4)).await.unwrap().timesheet;

    assert_eq!(sheet.timing, Some(NIGHT_TIMING));
    assert_eq!(sheet.expected_window(), Some((at(3, 4, 21, 0), at(3, 5, 6, 0))));
}

#[tokio::test]
async fn unassigned_user_gets_a_timing_less_workday_sheet() {
    let h = Harness::new(at(3, 4, 7, 0));

    let first = h.lifecycle.ensure_timesheet(99, date(3, 4)).await.unwrap();
    let second = h.lifecycle.ensure_timesheet(99, date(3, 4)).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.timesheet.id, second.timesheet.id);

    let sheet = second.timesheet;
    assert_eq!(sheet.shift, None);
    assert_eq!(sheet.timing, None);
    assert_eq!(sheet.schedule.coefficient, Coefficient::Workday);
    assert_eq!(sheet.expected_window(), None);
    assert_eq!(sheet.schedule.working_minutes, 0);
}

#[tokio::test]
async fn shift_edit_that_makes_a_punch_late_raises_the_alert() {
    let h = Harness::new(at(3, 4, 9, 30));
    let timely = h
        .ingestion
        .clock(ClockRequest::new(DAY_WORKER, at(3, 4, 9, 5), EntryMethod::WebApp))
        .await
        .unwrap();
    assert!(timely.events.is_empty());

    let mut earlier = day_shift();
    for day in &mut earlier.work_days {
        for timing in &mut day.timings {
            timing.start_time = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        }
    }
    h.shifts.replace_shift(earlier);
    h.lifecycle.resolver().invalidate_shift(DAY_SHIFT).await;

    let report = h.lifecycle.populate(date(3, 4)).await.unwrap();
    assert_eq!(report.updated, 1);

    let alerts = h.events.named("late_in");
    assert_eq!(alerts.len(), 1);
    assert!(matches!(
        alerts[0],
        AttendanceEvent::LateIn { user: DAY_WORKER, punch, .. } if punch == at(3, 4, 9, 5)
    ));

    // Re-deriving the unchanged sheet does not repeat the alert.
    h.lifecycle.populate(date(3, 4)).await.unwrap();
    assert_eq!(h.events.named("late_in").len(), 1);
}

#[tokio::test]
async fn applied_leave_survives_population() {
    let h = Harness::new(at(3, 4, 7, 0));

    let outcomes = h.lifecycle.apply_leave(DAY_WORKER, date(3, 4), LeaveCoefficient::FullLeave).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].timesheet.schedule.leave_coefficient, LeaveCoefficient::FullLeave);

    let report = h.lifecycle.populate(date(3, 4)).await.unwrap();
    assert_eq!(report.failed, 0);

    let sheets = h.timesheets.sheets_for(DAY_WORKER);
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].schedule.leave_coefficient, LeaveCoefficient::FullLeave);
    assert!(sheets[0].is_non_working());
}

#[tokio::test]
async fn apply_leave_reports_the_changed_field() {
    let h = Harness::new(at(3, 4, 7, 0));
    h.lifecycle.ensure_timesheet(DAY_WORKER, date(3, 4)).await.unwrap();

    let outcomes = h.lifecycle.apply_leave(DAY_WORKER, date(3, 4), LeaveCoefficient::SecondHalf).await.unwrap();

    assert!(!outcomes[0].created);
    assert_eq!(outcomes[0].changed.names(), vec!["leave_coefficient"]);

    let again = h.lifecycle.apply_leave(DAY_WORKER, date(3, 4), LeaveCoefficient::SecondHalf).await.unwrap();
    assert!(again[0].changed.is_empty());
}

#[tokio::test]
async fn population_covers_every_assigned_user_once() {
    let h = Harness::new(at(3, 4, 0, 5));

    let first = h.lifecycle.populate(date(3, 4)).await.unwrap();
    assert_eq!(first.users, 2);
    assert_eq!(first.created, 2);
    assert_eq!(first.failed, 0);

    let second = h.lifecycle.populate(date(3, 4)).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.unchanged, 2);
    assert_eq!(h.timesheets.sheets_for(DAY_WORKER).len(), 1);
    assert_eq!(h.timesheets.sheets_for(NIGHT_WORKER).len(), 1);
}

#[tokio::test]
async fn roster_override_creates_a_sheet_carrying_the_day_leave() {
    let h = Harness::new(at(3, 4, 7, 0));
    h.lifecycle.apply_leave(DAY_WORKER, date(3, 4), LeaveCoefficient::FirstHalf).await.unwrap();

    h.shifts.add_roster(RosterOverride { user: DAY_WORKER, date: date(3, 4), shift: NIGHT_SHIFT });
    let outcome = h.lifecycle.ensure_timesheet(DAY_WORKER, date(3, 4)).await.unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.timesheet.shift, Some(NIGHT_SHIFT));
    assert_eq!(outcome.timesheet.schedule.leave_coefficient, LeaveCoefficient::FirstHalf);
}
