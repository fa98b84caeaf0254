//! Port interfaces for shift resolution

use async_trait::async_trait;
use chrono::NaiveDate;
use timekeep_domain::{
    Result, RosterOverride, ShiftAssignment, ShiftDefinition, ShiftId, UserId,
};

/// Read access to shifts, assignments and roster overrides.
#[async_trait]
pub trait ShiftRepository: Send + Sync {
    /// Every assignment row of a user, in any order and unvalidated.
    async fn assignments_for_user(&self, user: UserId) -> Result<Vec<ShiftAssignment>>;

    async fn roster_override(&self, user: UserId, date: NaiveDate)
        -> Result<Option<RosterOverride>>;

    async fn shift(&self, id: ShiftId) -> Result<Option<ShiftDefinition>>;

    /// Users holding an assignment that covers `date`.
    async fn users_with_assignment_on(&self, date: NaiveDate) -> Result<Vec<UserId>>;
}

/// Holiday lookups, answered by the organization calendar.
#[async_trait]
pub trait HolidayCalendar: Send + Sync {
    async fn is_holiday(&self, user: UserId, date: NaiveDate) -> Result<bool>;
}

/// Calendar without holidays.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHolidays;

#[async_trait]
impl HolidayCalendar for NoHolidays {
    async fn is_holiday(&self, _user: UserId, _date: NaiveDate) -> Result<bool> {
        Ok(false)
    }
}
