use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, CreditTransaction, Lead, LeadAssignment,
    LeadId, NewCreditTransaction, Profile, UserId,
};

/// Lead records, their status and assignment.
pub trait LeadRegistry: Send + Sync {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, StoreError>;
    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, StoreError>;
    fn active_leads(&self) -> Result<Vec<Lead>, StoreError>;
    fn leads_created_by(&self, owner: &UserId) -> Result<Vec<Lead>, StoreError>;
    /// Replaces the stored row with the same id.
    fn update_lead(&self, lead: Lead) -> Result<Lead, StoreError>;
    /// Removes the lead together with its applications.
    fn delete_lead(&self, id: &LeadId) -> Result<(), StoreError>;
    /// Overwrites `assigned_to`/`assigned_at`; `None` clears both.
    fn set_assignment(
        &self,
        id: &LeadId,
        assignment: Option<LeadAssignment>,
    ) -> Result<Lead, StoreError>;
}

/// Application rows. Inserts must reject a second row for the same
/// `(lead_id, applicant_id)` pair with [`StoreError::Conflict`].
pub trait ApplicationStore: Send + Sync {
    fn count_for_lead(&self, lead_id: &LeadId) -> Result<usize, StoreError>;
    fn find_for_applicant(
        &self,
        lead_id: &LeadId,
        applicant_id: &UserId,
    ) -> Result<Option<Application>, StoreError>;
    fn accepted_for_lead(
        &self,
        lead_id: &LeadId,
        excluding: &ApplicationId,
    ) -> Result<Option<Application>, StoreError>;
    fn insert_application(&self, application: Application) -> Result<Application, StoreError>;
    fn fetch_application(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError>;
    fn update_application_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Application, StoreError>;
    fn delete_application(&self, id: &ApplicationId) -> Result<(), StoreError>;
    fn applications_by_applicant(
        &self,
        applicant_id: &UserId,
    ) -> Result<Vec<Application>, StoreError>;
    fn applications_for_leads(&self, lead_ids: &[LeadId]) -> Result<Vec<Application>, StoreError>;
}

/// Profiles with their balances plus the credit transaction history.
pub trait LedgerStore: Send + Sync {
    fn profile(&self, id: &UserId) -> Result<Option<Profile>, StoreError>;
    fn upsert_profile(&self, profile: Profile) -> Result<Profile, StoreError>;
    fn set_credits(&self, id: &UserId, credits: u64) -> Result<(), StoreError>;
    fn append_transaction(
        &self,
        entry: NewCreditTransaction,
    ) -> Result<CreditTransaction, StoreError>;
    fn transactions(&self, user_id: &UserId) -> Result<Vec<CreditTransaction>, StoreError>;
}

/// The full data store the marketplace services run against.
pub trait MarketStore: LeadRegistry + ApplicationStore + LedgerStore {}

impl<T> MarketStore for T where T: LeadRegistry + ApplicationStore + LedgerStore {}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
