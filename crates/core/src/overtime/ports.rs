//! Port interfaces for overtime storage and the leave collaborator

use async_trait::async_trait;
use timekeep_domain::{
    ClaimHistory, ClaimId, ClaimStatus, CompensatoryRule, NewOvertime, OvertimeDetail,
    OvertimeEntryId, OvertimeRecord, OvertimeSetting, OvertimeSettingId, Result, TimesheetId,
    UserId,
};

/// Persistence for overtime entries, claims and their history.
///
/// Every method that writes more than one row does so in one transaction.
#[async_trait]
pub trait OvertimeRepository: Send + Sync {
    /// The overtime setting currently assigned to `user`.
    async fn setting_for_user(&self, user: UserId) -> Result<Option<OvertimeSetting>>;

    async fn setting(&self, id: OvertimeSettingId) -> Result<Option<OvertimeSetting>>;

    async fn record_for_timesheet(&self, timesheet: TimesheetId) -> Result<Option<OvertimeRecord>>;

    async fn claim(&self, id: ClaimId) -> Result<Option<OvertimeRecord>>;

    /// Insert the entry, its detail, an `Unclaimed` claim and the first
    /// history row. A second entry for the same timesheet is an
    /// `IntegrityConflict`.
    async fn insert_generated(&self, overtime: NewOvertime) -> Result<OvertimeRecord>;

    /// Delete `old` with its claim and history and insert `new` in its place.
    async fn replace_generated(
        &self,
        old: OvertimeEntryId,
        new: Option<NewOvertime>,
    ) -> Result<Option<OvertimeRecord>>;

    async fn update_detail(
        &self,
        entry: OvertimeEntryId,
        detail: &OvertimeDetail,
        history: ClaimHistory,
    ) -> Result<OvertimeRecord>;

    async fn update_claim_status(
        &self,
        claim: ClaimId,
        status: ClaimStatus,
        history: ClaimHistory,
    ) -> Result<OvertimeRecord>;

    /// Unarchived claims still in `Unclaimed`.
    async fn unclaimed_claims(&self) -> Result<Vec<OvertimeRecord>>;

    /// Archive the claims and write an expiry history row for each one.
    async fn archive_claims(&self, claims: &[ClaimId], history: Vec<ClaimHistory>) -> Result<usize>;

    async fn history(&self, claim: ClaimId) -> Result<Vec<ClaimHistory>>;
}

/// Compensatory leave rules of a user's leave account, owned by the leave
/// collaborator.
#[async_trait]
pub trait CompensatoryRules: Send + Sync {
    async fn rules_for(&self, user: UserId) -> Result<Option<Vec<CompensatoryRule>>>;
}

/// For deployments without a leave collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompensatoryLeave;

#[async_trait]
impl CompensatoryRules for NoCompensatoryLeave {
    async fn rules_for(&self, _user: UserId) -> Result<Option<Vec<CompensatoryRule>>> {
        Ok(None)
    }
}
