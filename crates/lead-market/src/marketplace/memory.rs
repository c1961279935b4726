use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::domain::{
    Application, ApplicationId, ApplicationStatus, CreditTransaction, Lead, LeadAssignment,
    LeadId, NewCreditTransaction, Profile, UserId,
};
use super::store::{ApplicationStore, LeadRegistry, LedgerStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    leads: HashMap<LeadId, Lead>,
    applications: HashMap<ApplicationId, Application>,
    profiles: HashMap<UserId, Profile>,
    transactions: Vec<CreditTransaction>,
}

/// Process-local store used by the demo command, the default server wiring,
/// and tests. Every call is a single critical section over all tables.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMarketStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryMarketStore {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

fn newest_first<T>(rows: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
}

impl LeadRegistry for InMemoryMarketStore {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, StoreError> {
        let mut tables = self.tables()?;
        if tables.leads.contains_key(&lead.id) {
            return Err(StoreError::Conflict);
        }
        tables.leads.insert(lead.id, lead.clone());
        Ok(lead)
    }

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, StoreError> {
        Ok(self.tables()?.leads.get(id).cloned())
    }

    fn active_leads(&self) -> Result<Vec<Lead>, StoreError> {
        let mut leads: Vec<Lead> = self
            .tables()?
            .leads
            .values()
            .filter(|lead| lead.is_active())
            .cloned()
            .collect();
        newest_first(&mut leads, |lead| lead.created_at);
        Ok(leads)
    }

    fn leads_created_by(&self, owner: &UserId) -> Result<Vec<Lead>, StoreError> {
        let mut leads: Vec<Lead> = self
            .tables()?
            .leads
            .values()
            .filter(|lead| lead.created_by == *owner)
            .cloned()
            .collect();
        newest_first(&mut leads, |lead| lead.created_at);
        Ok(leads)
    }

    fn update_lead(&self, lead: Lead) -> Result<Lead, StoreError> {
        let mut tables = self.tables()?;
        let stored = tables.leads.get_mut(&lead.id).ok_or(StoreError::NotFound)?;
        *stored = lead.clone();
        Ok(lead)
    }

    fn delete_lead(&self, id: &LeadId) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        tables.leads.remove(id).ok_or(StoreError::NotFound)?;
        tables
            .applications
            .retain(|_, application| application.lead_id != *id);
        Ok(())
    }

    fn set_assignment(
        &self,
        id: &LeadId,
        assignment: Option<LeadAssignment>,
    ) -> Result<Lead, StoreError> {
        let mut tables = self.tables()?;
        let lead = tables.leads.get_mut(id).ok_or(StoreError::NotFound)?;
        lead.assigned_to = assignment.map(|value| value.applicant_id);
        lead.assigned_at = assignment.map(|value| value.assigned_at);
        Ok(lead.clone())
    }
}

impl ApplicationStore for InMemoryMarketStore {
    fn count_for_lead(&self, lead_id: &LeadId) -> Result<usize, StoreError> {
        Ok(self
            .tables()?
            .applications
            .values()
            .filter(|application| application.lead_id == *lead_id)
            .count())
    }

    fn find_for_applicant(
        &self,
        lead_id: &LeadId,
        applicant_id: &UserId,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .tables()?
            .applications
            .values()
            .find(|application| {
                application.lead_id == *lead_id && application.applicant_id == *applicant_id
            })
            .cloned())
    }

    fn accepted_for_lead(
        &self,
        lead_id: &LeadId,
        excluding: &ApplicationId,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .tables()?
            .applications
            .values()
            .find(|application| {
                application.lead_id == *lead_id
                    && application.id != *excluding
                    && application.status == ApplicationStatus::Accepted
            })
            .cloned())
    }

    fn insert_application(&self, application: Application) -> Result<Application, StoreError> {
        let mut tables = self.tables()?;
        let duplicate = tables.applications.values().any(|existing| {
            existing.id == application.id
                || (existing.lead_id == application.lead_id
                    && existing.applicant_id == application.applicant_id)
        });
        if duplicate {
            return Err(StoreError::Conflict);
        }
        tables
            .applications
            .insert(application.id, application.clone());
        Ok(application)
    }

    fn fetch_application(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError> {
        Ok(self.tables()?.applications.get(id).cloned())
    }

    fn update_application_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Application, StoreError> {
        let mut tables = self.tables()?;
        let application = tables.applications.get_mut(id).ok_or(StoreError::NotFound)?;
        application.status = status;
        application.updated_at = updated_at;
        Ok(application.clone())
    }

    fn delete_application(&self, id: &ApplicationId) -> Result<(), StoreError> {
        self.tables()?
            .applications
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn applications_by_applicant(
        &self,
        applicant_id: &UserId,
    ) -> Result<Vec<Application>, StoreError> {
        let mut rows: Vec<Application> = self
            .tables()?
            .applications
            .values()
            .filter(|application| application.applicant_id == *applicant_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |application| application.created_at);
        Ok(rows)
    }

    fn applications_for_leads(&self, lead_ids: &[LeadId]) -> Result<Vec<Application>, StoreError> {
        let mut rows: Vec<Application> = self
            .tables()?
            .applications
            .values()
            .filter(|application| lead_ids.contains(&application.lead_id))
            .cloned()
            .collect();
        newest_first(&mut rows, |application| application.created_at);
        Ok(rows)
    }
}

impl LedgerStore for InMemoryMarketStore {
    fn profile(&self, id: &UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self.tables()?.profiles.get(id).cloned())
    }

    fn upsert_profile(&self, profile: Profile) -> Result<Profile, StoreError> {
        self.tables()?.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    fn set_credits(&self, id: &UserId, credits: u64) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let profile = tables.profiles.get_mut(id).ok_or(StoreError::NotFound)?;
        profile.credits = credits;
        Ok(())
    }

    fn append_transaction(
        &self,
        entry: NewCreditTransaction,
    ) -> Result<CreditTransaction, StoreError> {
        let transaction = CreditTransaction {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            amount: entry.amount,
            transaction_type: entry.transaction_type,
            description: entry.description,
            payment_id: entry.payment_id,
            created_at: Utc::now(),
        };
        self.tables()?.transactions.push(transaction.clone());
        Ok(transaction)
    }

    fn transactions(&self, user_id: &UserId) -> Result<Vec<CreditTransaction>, StoreError> {
        // Appended in order, so reversing yields newest first even when
        // timestamps collide.
        Ok(self
            .tables()?
            .transactions
            .iter()
            .rev()
            .filter(|transaction| transaction.user_id == *user_id)
            .cloned()
            .collect())
    }
}
