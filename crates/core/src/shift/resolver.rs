//! Shift resolution
//!
//! Answers "which shift governs this user on this date" and "which timing
//! governs this instant". Roster overrides win over assignments; overlapping
//! assignments are reported, never silently resolved.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use moka::future::Cache;
use timekeep_domain::{
    AssignmentTarget, AttendanceError, Coefficient, Result, ShiftDefinition, ShiftId, UserId,
    WorkTiming,
};
use tracing::{error, instrument};

use super::interval_index::IntervalIndex;
use super::ports::{HolidayCalendar, ShiftRepository};
use crate::settings::EngineSettings;

const SHIFT_CACHE_CAPACITY: u64 = 512;
const SHIFT_CACHE_TTL: StdDuration = StdDuration::from_secs(300);

/// What a user is bound to on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Shift(Arc<ShiftDefinition>),
    /// Hourly employee without a fixed timing.
    WorkingHours,
    /// No assignment covers the date. Punches still land on a workday sheet.
    Unassigned,
}

/// Resolved schedule of one user on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPlan {
    pub user: UserId,
    pub date: NaiveDate,
    pub resolution: Resolution,
    /// Timings of the matching work day, ordered by start. Empty on offdays.
    pub timings: Vec<WorkTiming>,
    pub coefficient: Coefficient,
}

impl DayPlan {
    pub fn shift(&self) -> Option<&ShiftDefinition> {
        match &self.resolution {
            Resolution::Shift(shift) => Some(shift),
            Resolution::WorkingHours | Resolution::Unassigned => None,
        }
    }

    /// Timing-less workday plan for a user nothing is assigned to.
    pub fn unscheduled(user: UserId, date: NaiveDate) -> Self {
        Self { user, date, resolution: Resolution::Unassigned, timings: Vec::new(), coefficient: Coefficient::Workday }
    }

    pub fn shift_id(&self) -> Option<ShiftId> {
        self.shift().map(|shift| shift.id)
    }
}

/// A timing anchored to a work date, with UTC bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingWindow {
    pub date: NaiveDate,
    pub timing: WorkTiming,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimingWindow {
    fn distance_to(&self, instant: DateTime<Utc>) -> Duration {
        (instant - self.start).abs().min((instant - self.end).abs())
    }
}

pub struct ShiftResolver {
    shifts: Arc<dyn ShiftRepository>,
    holidays: Arc<dyn HolidayCalendar>,
    settings: Arc<EngineSettings>,
    cache: Cache<ShiftId, Arc<ShiftDefinition>>,
}

impl ShiftResolver {
    pub fn new(
        shifts: Arc<dyn ShiftRepository>,
        holidays: Arc<dyn HolidayCalendar>,
        settings: Arc<EngineSettings>,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(SHIFT_CACHE_CAPACITY)
            .time_to_live(SHIFT_CACHE_TTL)
            .build();
        Self { shifts, holidays, settings, cache }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Drop a cached shift after it was edited.
    pub async fn invalidate_shift(&self, id: ShiftId) {
        self.cache.invalidate(&id).await;
    }

    /// Shift or working-hours binding of `user` on `date`.
    ///
    /// # Errors
    /// `NoShiftAssigned` when nothing covers the date and
    /// `AmbiguousShiftAssignment` when stored assignments overlap it.
    #[instrument(skip(self))]
    pub async fn resolve(&self, user: UserId, date: NaiveDate) -> Result<Resolution> {
        if let Some(roster) = self.shifts.roster_override(user, date).await? {
            return Ok(Resolution::Shift(self.load_shift(roster.shift).await?));
        }

        let rows = self.shifts.assignments_for_user(user).await?;
        let index = IntervalIndex::from_unchecked(rows.into_iter().map(|row| (row.validity, row.target)));

        match index.find(date) {
            Ok(Some(AssignmentTarget::Shift(id))) => Ok(Resolution::Shift(self.load_shift(*id).await?)),
            Ok(Some(AssignmentTarget::WorkingHours)) => Ok(Resolution::WorkingHours),
            Ok(None) => Err(AttendanceError::NoShiftAssigned { user, date }),
            Err(overlap) => {
                error!(user, %date, count = overlap.count, "shift_resolver.ambiguous_assignment");
                Err(AttendanceError::AmbiguousShiftAssignment { user, date })
            }
        }
    }

    /// Resolution plus the work day's timings and the day coefficient.
    pub async fn day_plan(&self, user: UserId, date: NaiveDate) -> Result<DayPlan> {
        let resolution = self.resolve(user, date).await?;

        let (timings, coefficient) = match &resolution {
            Resolution::WorkingHours | Resolution::Unassigned => (Vec::new(), Coefficient::Workday),
            Resolution::Shift(shift) => {
                let days = IntervalIndex::from_unchecked(
                    shift.work_days_for(date.weekday()).map(|day| (day.validity, day)),
                );
                let work_day = days.find(date).map_err(|overlap| {
                    error!(user, %date, shift = shift.id, count = overlap.count, "shift_resolver.ambiguous_work_day");
                    AttendanceError::AmbiguousShiftAssignment { user, date }
                })?;

                let mut timings = work_day.map(|day| day.timings.clone()).unwrap_or_default();
                timings.sort_by_key(|timing| timing.start_time);

                let is_holiday = self.holidays.is_holiday(user, date).await?;
                let coefficient = Coefficient::derive(is_holiday, !timings.is_empty());
                (timings, coefficient)
            }
        };

        Ok(DayPlan { user, date, resolution, timings, coefficient })
    }

    /// UTC window of `timing` worked on `date`.
    pub fn window(&self, date: NaiveDate, timing: &WorkTiming) -> TimingWindow {
        let (start, end) = timing.local_bounds(date);
        TimingWindow {
            date,
            timing: timing.clone(),
            start: self.settings.localize(start),
            end: self.settings.localize(end),
        }
    }

    /// Window of the timing that governs `instant`, looking at the local date
    /// and the day before it.
    ///
    /// On an offday, a punch up to `offday_punchout_waiting` after the previous
    /// day's last window still belongs to that window. Otherwise the window
    /// whose start or end lies closest to the instant wins.
    #[instrument(skip(self))]
    pub async fn timing_for_instant(
        &self,
        user: UserId,
        instant: DateTime<Utc>,
    ) -> Result<Option<TimingWindow>> {
        let local_date = self.settings.local_date(instant);
        let previous_date = local_date - Duration::days(1);

        let today = self.windows_on(user, local_date).await?;
        let previous = self.windows_on(user, previous_date).await?;

        if today.is_empty() {
            let last = previous.into_iter().max_by_key(|window| window.end);
            return Ok(last.filter(|window| instant <= window.end + self.settings.offday_punchout_waiting));
        }

        let best = today
            .into_iter()
            .chain(previous.into_iter().filter(|window| window.timing.extends || window.end > instant))
            .min_by_key(|window| window.distance_to(instant));
        Ok(best)
    }

    async fn windows_on(&self, user: UserId, date: NaiveDate) -> Result<Vec<TimingWindow>> {
        match self.day_plan(user, date).await {
            Ok(plan) => Ok(plan.timings.iter().map(|timing| self.window(date, timing)).collect()),
            Err(AttendanceError::NoShiftAssigned { .. }) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    async fn load_shift(&self, id: ShiftId) -> Result<Arc<ShiftDefinition>> {
        if let Some(shift) = self.cache.get(&id).await {
            return Ok(shift);
        }
        let shift = self
            .shifts
            .shift(id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("shift {id}")))?;
        let shift = Arc::new(shift);
        self.cache.insert(id, Arc::clone(&shift)).await;
        Ok(shift)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{NaiveTime, TimeZone, Weekday};
    use timekeep_domain::{DateRange, RosterOverride, ShiftAssignment, WorkDay};

    use super::*;
    use crate::shift::ports::NoHolidays;

    #[derive(Default)]
    struct Fixture {
        assignments: Vec<ShiftAssignment>,
        rosters: Vec<RosterOverride>,
        shifts: Vec<ShiftDefinition>,
    }

    #[async_trait]
    impl ShiftRepository for Fixture {
        async fn assignments_for_user(&self, user: UserId) -> Result<Vec<ShiftAssignment>> {
            Ok(self.assignments.iter().filter(|a| a.user == user).cloned().collect())
        }

        async fn roster_override(&self, user: UserId, date: NaiveDate) -> Result<Option<RosterOverride>> {
            Ok(self.rosters.iter().find(|r| r.user == user && r.date == date).cloned())
        }

        async fn shift(&self, id: ShiftId) -> Result<Option<ShiftDefinition>> {
            Ok(self.shifts.iter().find(|s| s.id == id).cloned())
        }

        async fn users_with_assignment_on(&self, _date: NaiveDate) -> Result<Vec<UserId>> {
            Ok(Vec::new())
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn shift(id: ShiftId, start: NaiveTime, end: NaiveTime, extends: bool, days: &[Weekday]) -> ShiftDefinition {
        ShiftDefinition {
            id,
            organization: 1,
            name: format!("shift-{id}"),
            start_time_grace_secs: 600,
            end_time_grace_secs: 600,
            work_days: days
                .iter()
                .map(|day| WorkDay {
                    day: *day,
                    validity: DateRange::open(date(1)),
                    timings: vec![WorkTiming { id: id * 10, start_time: start, end_time: end, extends, working_minutes: 540 }],
                })
                .collect(),
        }
    }

    fn assignment(id: i64, target: AssignmentTarget, validity: DateRange) -> ShiftAssignment {
        ShiftAssignment { id, user: 1, target, validity }
    }

    fn resolver(fixture: Fixture) -> ShiftResolver {
        ShiftResolver::new(Arc::new(fixture), Arc::new(NoHolidays), Arc::new(EngineSettings::default()))
    }

    const ALL_DAYS: [Weekday; 7] =
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri, Weekday::Sat, Weekday::Sun];

    #[tokio::test]
    async fn roster_override_beats_assignment() {
        let resolver = resolver(Fixture {
            assignments: vec![assignment(1, AssignmentTarget::Shift(1), DateRange::open(date(1)))],
            rosters: vec![RosterOverride { user: 1, date: date(8), shift: 2 }],
            shifts: vec![
                shift(1, hm(9, 0), hm(18, 0), false, &ALL_DAYS),
                shift(2, hm(21, 0), hm(6, 0), true, &ALL_DAYS),
            ],
        });

        let on_override = resolver.resolve(1, date(8)).await.unwrap();
        let regular = resolver.resolve(1, date(9)).await.unwrap();

        assert!(matches!(on_override, Resolution::Shift(ref s) if s.id == 2));
        assert!(matches!(regular, Resolution::Shift(ref s) if s.id == 1));
    }

    #[tokio::test]
    async fn overlapping_assignments_are_ambiguous() {
        let resolver = resolver(Fixture {
            assignments: vec![
                assignment(1, AssignmentTarget::Shift(1), DateRange::open(date(1))),
                assignment(2, AssignmentTarget::WorkingHours, DateRange::new(date(5), Some(date(10))).unwrap()),
            ],
            shifts: vec![shift(1, hm(9, 0), hm(18, 0), false, &ALL_DAYS)],
            ..Fixture::default()
        });

        let err = resolver.resolve(1, date(6)).await.unwrap_err();
        assert_eq!(err, AttendanceError::AmbiguousShiftAssignment { user: 1, date: date(6) });
    }

    #[tokio::test]
    async fn missing_assignment_is_reported() {
        let resolver = resolver(Fixture::default());
        let err = resolver.resolve(1, date(6)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NoShiftAssigned { user: 1, .. }));
    }

    #[tokio::test]
    async fn day_without_work_day_is_offday() {
        // 2024-05-04 is a Saturday
        let resolver = resolver(Fixture {
            assignments: vec![assignment(1, AssignmentTarget::Shift(1), DateRange::open(date(1)))],
            shifts: vec![shift(1, hm(9, 0), hm(18, 0), false, &[Weekday::Mon, Weekday::Fri])],
            ..Fixture::default()
        });

        let saturday = resolver.day_plan(1, date(4)).await.unwrap();
        let friday = resolver.day_plan(1, date(3)).await.unwrap();

        assert_eq!(saturday.coefficient, Coefficient::Offday);
        assert!(saturday.timings.is_empty());
        assert_eq!(friday.coefficient, Coefficient::Workday);
    }

    #[tokio::test]
    async fn overnight_punches_resolve_to_the_evening_date() {
        let resolver = resolver(Fixture {
            assignments: vec![assignment(1, AssignmentTarget::Shift(1), DateRange::open(date(1)))],
            shifts: vec![shift(1, hm(21, 0), hm(6, 0), true, &ALL_DAYS)],
            ..Fixture::default()
        });

        let evening = Utc.with_ymd_and_hms(2024, 5, 6, 23, 30, 0).unwrap();
        let morning = Utc.with_ymd_and_hms(2024, 5, 7, 5, 30, 0).unwrap();

        let first = resolver.timing_for_instant(1, evening).await.unwrap().unwrap();
        let second = resolver.timing_for_instant(1, morning).await.unwrap().unwrap();

        assert_eq!(first.date, date(6));
        assert_eq!(second.date, date(6));
        assert_eq!(second.end, Utc.with_ymd_and_hms(2024, 5, 7, 6, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn offday_punch_within_waiting_goes_to_previous_timing() {
        // Friday 14:00-23:00, Saturday off
        let resolver = resolver(Fixture {
            assignments: vec![assignment(1, AssignmentTarget::Shift(1), DateRange::open(date(1)))],
            shifts: vec![shift(1, hm(14, 0), hm(23, 0), false, &[Weekday::Fri])],
            ..Fixture::default()
        });

        let early_saturday = Utc.with_ymd_and_hms(2024, 5, 4, 1, 0, 0).unwrap();
        let late_saturday = Utc.with_ymd_and_hms(2024, 5, 4, 10, 0, 0).unwrap();

        let owned = resolver.timing_for_instant(1, early_saturday).await.unwrap();
        assert_eq!(owned.map(|w| w.date), Some(date(3)));
        assert!(resolver.timing_for_instant(1, late_saturday).await.unwrap().is_none());
    }
}
