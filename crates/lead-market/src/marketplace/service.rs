use std::sync::Arc;

use tracing::debug;

use super::domain::Identity;
use super::error::MarketError;
use super::identity::IdentityGate;
use super::leads::LeadCatalog;
use super::ledger::CreditLedger;
use super::locks::KeyedLocks;
use super::payments::PaymentVerifier;
use super::profiles::ProfileDirectory;
use super::store::MarketStore;
use super::workflow::{ApplicationWorkflow, WorkflowConfig};

/// Service composing the workflow engine, ledger, lead catalog, profile
/// directory and gates over one injected store handle.
pub struct MarketplaceService<S, I> {
    store: Arc<S>,
    identity: Arc<I>,
    applications: ApplicationWorkflow<S>,
    credits: Arc<CreditLedger<S>>,
    leads: LeadCatalog<S>,
    profiles: ProfileDirectory<S>,
    payments: PaymentVerifier,
}

impl<S, I> MarketplaceService<S, I>
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    pub fn new(
        store: Arc<S>,
        identity: Arc<I>,
        payments: PaymentVerifier,
        config: WorkflowConfig,
    ) -> Self {
        let locks = Arc::new(KeyedLocks::new());
        let credits = Arc::new(CreditLedger::new(store.clone(), locks.clone()));
        let applications =
            ApplicationWorkflow::new(store.clone(), credits.clone(), locks.clone(), config);
        let leads = LeadCatalog::new(store.clone(), locks.clone());
        let profiles = ProfileDirectory::new(store.clone(), credits.clone(), locks);

        Self {
            store,
            identity,
            applications,
            credits,
            leads,
            profiles,
            payments,
        }
    }

    pub fn applications(&self) -> &ApplicationWorkflow<S> {
        &self.applications
    }

    pub fn credits(&self) -> &CreditLedger<S> {
        &self.credits
    }

    pub fn leads(&self) -> &LeadCatalog<S> {
        &self.leads
    }

    pub fn profiles(&self) -> &ProfileDirectory<S> {
        &self.profiles
    }

    pub fn payments(&self) -> &PaymentVerifier {
        &self.payments
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Verify a bearer token, taking the role from the caller's profile when
    /// the token carries none.
    pub fn authenticate(&self, token: &str) -> Result<Identity, MarketError> {
        let mut identity = self.identity.verify(token)?;
        if identity.role.is_none() {
            identity.role = self.store.profile(&identity.id)?.map(|profile| profile.role);
            debug!(user_id = %identity.id, role = ?identity.role, "role resolved from profile");
        }
        Ok(identity)
    }
}
