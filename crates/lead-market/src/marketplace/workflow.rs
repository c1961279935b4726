use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, CreditTransaction, Identity, Lead,
    LeadAssignment, LeadId, Profile, Role, TransactionType, UserId,
};
use super::error::{ConflictReason, MarketError};
use super::ledger::{CreditLedger, LedgerEntry};
use super::locks::{KeyedLocks, LockKey};
use super::store::{MarketStore, StoreError};

pub const MAX_APPLICATIONS_PER_LEAD: usize = 6;
pub const DEFAULT_PURCHASE_MESSAGE: &str = "Lead purchased";

/// Tunables for the purchase workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub max_applications_per_lead: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_applications_per_lead: MAX_APPLICATIONS_PER_LEAD,
        }
    }
}

/// Finder's request to purchase a lead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub lead_id: Option<LeadId>,
    pub message: Option<String>,
}

/// Successful purchase: the auto-accepted application and the buyer's balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub application: Application,
    pub remaining_credits: u64,
    pub transaction: Option<CreditTransaction>,
}

/// Applicant details exposed to the lead owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicantSummary {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
}

impl From<Profile> for ApplicantSummary {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
            role: profile.role,
        }
    }
}

/// Application row joined with its lead and, for owners, the applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationListing {
    #[serde(flatten)]
    pub application: Application,
    pub lead: Option<Lead>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicant: Option<ApplicantSummary>,
}

/// Enforces capacity, exclusivity and single-charge rules for applications.
pub struct ApplicationWorkflow<S> {
    store: Arc<S>,
    ledger: Arc<CreditLedger<S>>,
    locks: Arc<KeyedLocks>,
    config: WorkflowConfig,
}

impl<S> ApplicationWorkflow<S>
where
    S: MarketStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        ledger: Arc<CreditLedger<S>>,
        locks: Arc<KeyedLocks>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            locks,
            config,
        }
    }

    pub fn config(&self) -> WorkflowConfig {
        self.config
    }

    /// Purchase a lead: create an accepted application and charge its cost.
    pub async fn create_application(
        &self,
        caller: &Identity,
        request: PurchaseRequest,
    ) -> Result<Purchase, MarketError> {
        if !caller.has_role(Role::LeadFinder) {
            return Err(MarketError::forbidden(
                "only lead-finder accounts can purchase leads",
            ));
        }
        let lead_id = request
            .lead_id
            .ok_or_else(|| MarketError::validation("lead ID is required"))?;

        let _lead_lock = self.locks.acquire(LockKey::Lead(lead_id)).await;
        let _user_lock = self.locks.acquire(LockKey::User(caller.id)).await;

        self.ensure_capacity(&lead_id)?;

        let lead = self
            .store
            .fetch_lead(&lead_id)?
            .filter(Lead::is_active)
            .ok_or(MarketError::NotFound("lead"))?;

        if self
            .store
            .find_for_applicant(&lead_id, &caller.id)?
            .is_some()
        {
            return Err(MarketError::Conflict(ConflictReason::AlreadyApplied));
        }

        let profile = self
            .store
            .profile(&caller.id)?
            .ok_or(MarketError::NotFound("profile"))?;
        if profile.credits < lead.credit_cost {
            warn!(
                %lead_id,
                user_id = %caller.id,
                required = lead.credit_cost,
                available = profile.credits,
                "purchase rejected for insufficient credits"
            );
            return Err(MarketError::InsufficientFunds {
                required: lead.credit_cost,
                available: profile.credits,
            });
        }

        self.ensure_capacity(&lead_id)?;

        let charge = i64::try_from(lead.credit_cost)
            .map_err(|_| MarketError::validation("lead credit cost is out of range"))?;
        let now = Utc::now();
        let application = Application {
            id: ApplicationId::new(),
            lead_id,
            applicant_id: caller.id,
            message: request
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PURCHASE_MESSAGE.to_string()),
            status: ApplicationStatus::Accepted,
            created_at: now,
            updated_at: now,
        };

        let application = match self.store.insert_application(application) {
            Ok(application) => application,
            Err(StoreError::Conflict) => {
                return Err(MarketError::Conflict(ConflictReason::AlreadyApplied))
            }
            Err(other) => return Err(other.into()),
        };

        let entry = LedgerEntry::new(
            TransactionType::LeadPurchase,
            format!("Purchased lead: {}", lead.title),
        );
        let adjustment = match self.ledger.adjust_locked(&caller.id, -charge, entry) {
            Ok(adjustment) => adjustment,
            Err(failure) => {
                error!(
                    application_id = %application.id,
                    %failure,
                    "credit debit failed; removing unpaid application"
                );
                if let Err(rollback) = self.store.delete_application(&application.id) {
                    error!(
                        application_id = %application.id,
                        %rollback,
                        "compensating delete failed"
                    );
                }
                return Err(MarketError::CreditUpdateFailed(debit_failure(failure)));
            }
        };

        info!(
            application_id = %application.id,
            %lead_id,
            user_id = %caller.id,
            charged = lead.credit_cost,
            remaining = adjustment.new_balance,
            "lead purchased"
        );

        Ok(Purchase {
            application,
            remaining_credits: adjustment.new_balance,
            transaction: adjustment.transaction,
        })
    }

    /// Owner decision on an application.
    ///
    /// Accepting assigns the lead to the applicant; the assignment is rolled
    /// back if the status write fails.
    pub async fn update_status(
        &self,
        caller: &Identity,
        application_id: &ApplicationId,
        status: &str,
    ) -> Result<Application, MarketError> {
        if !caller.has_role(Role::LeadApplier) {
            return Err(MarketError::forbidden(
                "only lead-applier accounts can decide applications",
            ));
        }
        let status = ApplicationStatus::parse(status).ok_or_else(|| {
            MarketError::validation("status must be 'accepted', 'rejected', or 'pending'")
        })?;

        let lead_id = self.fetch_application(application_id)?.lead_id;
        let _lead_lock = self.locks.acquire(LockKey::Lead(lead_id)).await;

        let application = self.fetch_application(application_id)?;
        let lead = self
            .store
            .fetch_lead(&application.lead_id)?
            .ok_or(MarketError::NotFound("lead"))?;

        if lead.created_by != caller.id {
            return Err(MarketError::forbidden(
                "you don't have permission to update this application",
            ));
        }

        let now = Utc::now();
        let previous_assignment = lead.assignment();

        if status == ApplicationStatus::Accepted {
            if let Some(existing) = self
                .store
                .accepted_for_lead(&application.lead_id, &application.id)?
            {
                warn!(
                    %lead_id,
                    accepted = %existing.id,
                    requested = %application.id,
                    "acceptance rejected; lead already has an accepted application"
                );
                return Err(MarketError::Conflict(ConflictReason::AlreadyAccepted));
            }

            self.store.set_assignment(
                &lead.id,
                Some(LeadAssignment {
                    applicant_id: application.applicant_id,
                    assigned_at: now,
                }),
            )?;
        }

        let updated = match self
            .store
            .update_application_status(&application.id, status, now)
        {
            Ok(updated) => updated,
            Err(failure) => {
                if status == ApplicationStatus::Accepted {
                    if let Err(rollback) = self.store.set_assignment(&lead.id, previous_assignment)
                    {
                        error!(%lead_id, %rollback, "failed to restore lead assignment");
                    }
                }
                return Err(failure.into());
            }
        };

        info!(
            application_id = %updated.id,
            %lead_id,
            status = status.label(),
            "application status updated"
        );
        Ok(updated)
    }

    /// Applications visible to the caller, newest first.
    pub fn list_for(&self, caller: &Identity) -> Result<Vec<ApplicationListing>, MarketError> {
        match caller.role {
            Some(Role::LeadFinder) => self
                .store
                .applications_by_applicant(&caller.id)?
                .into_iter()
                .map(|application| -> Result<ApplicationListing, MarketError> {
                    let lead = self.store.fetch_lead(&application.lead_id)?;
                    Ok(ApplicationListing {
                        application,
                        lead,
                        applicant: None,
                    })
                })
                .collect(),
            Some(Role::LeadApplier) => {
                let owned = self.store.leads_created_by(&caller.id)?;
                if owned.is_empty() {
                    return Ok(Vec::new());
                }
                let lead_ids: Vec<LeadId> = owned.iter().map(|lead| lead.id).collect();
                self.store
                    .applications_for_leads(&lead_ids)?
                    .into_iter()
                    .map(|application| -> Result<ApplicationListing, MarketError> {
                        let lead = owned
                            .iter()
                            .find(|lead| lead.id == application.lead_id)
                            .cloned();
                        let applicant = self
                            .store
                            .profile(&application.applicant_id)?
                            .map(ApplicantSummary::from);
                        Ok(ApplicationListing {
                            application,
                            lead,
                            applicant,
                        })
                    })
                    .collect()
            }
            None => Ok(Vec::new()),
        }
    }

    fn ensure_capacity(&self, lead_id: &LeadId) -> Result<(), MarketError> {
        let count = self.store.count_for_lead(lead_id)?;
        if count >= self.config.max_applications_per_lead {
            warn!(%lead_id, count, "maximum applications reached");
            return Err(MarketError::CapacityExceeded {
                limit: self.config.max_applications_per_lead,
            });
        }
        Ok(())
    }

    fn fetch_application(&self, id: &ApplicationId) -> Result<Application, MarketError> {
        self.store
            .fetch_application(id)?
            .ok_or(MarketError::NotFound("application"))
    }
}

fn debit_failure(failure: MarketError) -> StoreError {
    match failure {
        MarketError::Store(store) | MarketError::CreditUpdateFailed(store) => store,
        other => StoreError::Unavailable(other.to_string()),
    }
}
