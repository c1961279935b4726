use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{Application, Identity, Lead, LeadId, LeadStatus, Role};
use super::error::MarketError;
use super::locks::{KeyedLocks, LockKey};
use super::store::MarketStore;
use super::workflow::ApplicantSummary;

const DEFAULT_LOCATION: &str = "Remote";
const DEFAULT_PAGE_SIZE: usize = 20;

/// Lead posted by an applier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewLead {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub credit_cost: u64,
}

/// Owner edit; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LeadUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub credit_cost: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl LeadUpdate {
    fn apply(self, lead: &mut Lead) -> Result<(), MarketError> {
        for (field, value) in [
            (&mut lead.title, self.title),
            (&mut lead.description, self.description),
            (&mut lead.category, self.category),
        ] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(MarketError::validation(
                        "title, description, and category cannot be blank",
                    ));
                }
                *field = value;
            }
        }
        if let Some(location) = self.location {
            lead.location = if location.trim().is_empty() {
                DEFAULT_LOCATION.to_string()
            } else {
                location
            };
        }
        if let Some(credit_cost) = self.credit_cost {
            if credit_cost == 0 {
                return Err(MarketError::validation("credit cost must be positive"));
            }
            lead.credit_cost = credit_cost;
        }
        if let Some(status) = self.status {
            lead.status = LeadStatus::parse(&status).ok_or_else(|| {
                MarketError::validation("status must be 'active', 'closed', or 'expired'")
            })?;
        }
        Ok(())
    }
}

/// Application on a lead as its owner sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadApplication {
    #[serde(flatten)]
    pub application: Application,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicant: Option<ApplicantSummary>,
}

/// One lead with the caller's view of its applications: every application
/// for the owner, the caller's own purchase for a finder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetail {
    pub lead: Lead,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applications: Option<Vec<LeadApplication>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_application: Option<Application>,
}

/// Public listing filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BrowseQuery {
    pub category: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl BrowseQuery {
    fn matches(&self, lead: &Lead) -> bool {
        if let Some(category) = &self.category {
            if &lead.category != category {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if &lead.location != location {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                lead.title.to_lowercase().contains(&needle)
                    || lead.description.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

/// Lead posting, owner edits and the per-role lead views.
pub struct LeadCatalog<S> {
    store: Arc<S>,
    locks: Arc<KeyedLocks>,
}

impl<S> LeadCatalog<S>
where
    S: MarketStore + 'static,
{
    pub fn new(store: Arc<S>, locks: Arc<KeyedLocks>) -> Self {
        Self { store, locks }
    }

    pub fn create_lead(&self, caller: &Identity, draft: NewLead) -> Result<Lead, MarketError> {
        if !caller.has_role(Role::LeadApplier) {
            return Err(MarketError::forbidden(
                "only lead-applier accounts can post leads",
            ));
        }
        let required = [&draft.title, &draft.description, &draft.category];
        if required.iter().any(|field| field.trim().is_empty()) || draft.credit_cost == 0 {
            return Err(MarketError::validation(
                "title, description, category, and credit cost are required",
            ));
        }

        let lead = Lead {
            id: LeadId::new(),
            title: draft.title,
            description: draft.description,
            category: draft.category,
            location: draft
                .location
                .filter(|location| !location.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            credit_cost: draft.credit_cost,
            status: LeadStatus::Active,
            created_by: caller.id,
            assigned_to: None,
            assigned_at: None,
            created_at: Utc::now(),
        };

        let stored = self.store.insert_lead(lead)?;
        info!(lead_id = %stored.id, owner = %caller.id, cost = stored.credit_cost, "lead posted");
        Ok(stored)
    }

    /// Active leads, newest first, filtered and paginated.
    pub fn browse(&self, query: &BrowseQuery) -> Result<Vec<Lead>, MarketError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0);
        Ok(self
            .store
            .active_leads()?
            .into_iter()
            .filter(|lead| query.matches(lead))
            .skip(offset)
            .take(limit)
            .collect())
    }

    pub fn lead(&self, id: &LeadId) -> Result<Lead, MarketError> {
        self.store
            .fetch_lead(id)?
            .ok_or(MarketError::NotFound("lead"))
    }

    /// Appliers see the leads they posted; everyone else sees active leads.
    pub fn leads_for(&self, caller: &Identity) -> Result<Vec<Lead>, MarketError> {
        if caller.has_role(Role::LeadApplier) {
            Ok(self.store.leads_created_by(&caller.id)?)
        } else {
            Ok(self.store.active_leads()?)
        }
    }

    pub fn lead_detail(&self, caller: &Identity, id: &LeadId) -> Result<LeadDetail, MarketError> {
        let lead = self.lead(id)?;
        let mut detail = LeadDetail {
            lead,
            applications: None,
            user_application: None,
        };

        match caller.role {
            Some(Role::LeadApplier) => {
                if detail.lead.created_by != caller.id {
                    return Err(MarketError::forbidden(
                        "you don't have permission to view this lead",
                    ));
                }
                let applications = self
                    .store
                    .applications_for_leads(&[detail.lead.id])?
                    .into_iter()
                    .map(|application| -> Result<LeadApplication, MarketError> {
                        let applicant = self
                            .store
                            .profile(&application.applicant_id)?
                            .map(ApplicantSummary::from);
                        Ok(LeadApplication {
                            application,
                            applicant,
                        })
                    })
                    .collect::<Result<Vec<_>, MarketError>>()?;
                detail.applications = Some(applications);
            }
            Some(Role::LeadFinder) => {
                detail.user_application = self.store.find_for_applicant(id, &caller.id)?;
            }
            None => {}
        }
        Ok(detail)
    }

    /// Owner edit. Status moves take effect under the lead lock, so a
    /// purchase in flight sees either the old or the new status.
    pub async fn update_lead(
        &self,
        caller: &Identity,
        id: &LeadId,
        update: LeadUpdate,
    ) -> Result<Lead, MarketError> {
        let _lead_lock = self.locks.acquire(LockKey::Lead(*id)).await;
        let mut lead = self.owned_lead(caller, id, "update")?;
        update.apply(&mut lead)?;

        let stored = self.store.update_lead(lead)?;
        info!(lead_id = %stored.id, status = stored.status.label(), "lead updated");
        Ok(stored)
    }

    pub async fn delete_lead(&self, caller: &Identity, id: &LeadId) -> Result<(), MarketError> {
        let _lead_lock = self.locks.acquire(LockKey::Lead(*id)).await;
        self.owned_lead(caller, id, "delete")?;

        self.store.delete_lead(id)?;
        info!(lead_id = %id, owner = %caller.id, "lead deleted");
        Ok(())
    }

    fn owned_lead(
        &self,
        caller: &Identity,
        id: &LeadId,
        action: &str,
    ) -> Result<Lead, MarketError> {
        if !caller.has_role(Role::LeadApplier) {
            return Err(MarketError::forbidden(format!(
                "only lead-applier accounts can {action} leads"
            )));
        }
        let lead = self.lead(id)?;
        if lead.created_by != caller.id {
            return Err(MarketError::forbidden(format!(
                "you don't have permission to {action} this lead"
            )));
        }
        Ok(lead)
    }
}
