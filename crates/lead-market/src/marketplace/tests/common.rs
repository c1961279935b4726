use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;

use crate::marketplace::domain::{
    Application, ApplicationId, ApplicationStatus, CreditTransaction, Identity, Lead,
    LeadAssignment, LeadId, LeadStatus, NewCreditTransaction, Profile, Role, UserId,
};
use crate::marketplace::identity::JwtIdentityGate;
use crate::marketplace::memory::InMemoryMarketStore;
use crate::marketplace::payments::PaymentVerifier;
use crate::marketplace::router::market_router;
use crate::marketplace::service::MarketplaceService;
use crate::marketplace::store::{
    ApplicationStore, LeadRegistry, LedgerStore, MarketStore, StoreError,
};
use crate::marketplace::workflow::WorkflowConfig;

pub(super) const JWT_SECRET: &[u8] = b"test-session-secret-with-plenty-of-length";
pub(super) const PAYMENT_SECRET: &str = "test-payment-secret";

pub(super) struct Harness<S> {
    pub(super) service: Arc<MarketplaceService<S, JwtIdentityGate>>,
    pub(super) store: Arc<S>,
    pub(super) gate: Arc<JwtIdentityGate>,
}

pub(super) fn harness() -> Harness<InMemoryMarketStore> {
    Harness::with_store(InMemoryMarketStore::default())
}

pub(super) fn faulty_harness() -> Harness<FaultyStore> {
    Harness::with_store(FaultyStore::default())
}

impl<S> Harness<S>
where
    S: MarketStore + 'static,
{
    pub(super) fn with_store(store: S) -> Self {
        let store = Arc::new(store);
        let gate = Arc::new(JwtIdentityGate::new(JWT_SECRET, None));
        let service = Arc::new(MarketplaceService::new(
            store.clone(),
            gate.clone(),
            PaymentVerifier::new(PAYMENT_SECRET),
            WorkflowConfig::default(),
        ));
        Self {
            service,
            store,
            gate,
        }
    }

    pub(super) fn profile(&self, role: Role, credits: u64) -> Identity {
        let id = UserId::new();
        self.store
            .upsert_profile(Profile {
                id,
                display_name: format!("{}-{}", role.label(), &id.to_string()[..8]),
                role,
                credits,
                profile_completed: false,
            })
            .expect("profile stored");
        Identity::new(id, role)
    }

    pub(super) fn finder(&self, credits: u64) -> Identity {
        self.profile(Role::LeadFinder, credits)
    }

    pub(super) fn applier(&self) -> Identity {
        self.profile(Role::LeadApplier, 0)
    }

    pub(super) fn lead(&self, owner: &Identity, credit_cost: u64) -> Lead {
        self.lead_with_status(owner, credit_cost, LeadStatus::Active)
    }

    pub(super) fn lead_with_status(
        &self,
        owner: &Identity,
        credit_cost: u64,
        status: LeadStatus,
    ) -> Lead {
        self.store
            .insert_lead(Lead {
                id: LeadId::new(),
                title: "Kitchen remodel in Austin".to_string(),
                description: "Homeowner wants quotes for cabinets and counters".to_string(),
                category: "home-improvement".to_string(),
                location: "Austin".to_string(),
                credit_cost,
                status,
                created_by: owner.id,
                assigned_to: None,
                assigned_at: None,
                created_at: Utc::now(),
            })
            .expect("lead stored")
    }

    pub(super) fn credits(&self, user: &Identity) -> u64 {
        self.store
            .profile(&user.id)
            .expect("profile lookup")
            .expect("profile present")
            .credits
    }

    pub(super) fn ledger(&self, user: &Identity) -> Vec<CreditTransaction> {
        self.store.transactions(&user.id).expect("history lookup")
    }

    pub(super) fn stored_lead(&self, id: &LeadId) -> Lead {
        self.store
            .fetch_lead(id)
            .expect("lead lookup")
            .expect("lead present")
    }

    pub(super) fn token(&self, identity: &Identity) -> String {
        self.gate
            .issue(identity, Duration::hours(1))
            .expect("session token")
    }

    pub(super) fn router(&self) -> axum::Router {
        market_router(self.service.clone())
    }
}

/// In-memory store whose writes can be switched to fail.
#[derive(Default)]
pub(super) struct FaultyStore {
    pub(super) inner: InMemoryMarketStore,
    pub(super) fail_credit_writes: AtomicBool,
    pub(super) fail_ledger_appends: AtomicBool,
    pub(super) fail_status_writes: AtomicBool,
}

fn offline(flag: &AtomicBool) -> Result<(), StoreError> {
    if flag.load(Ordering::SeqCst) {
        Err(StoreError::Unavailable("database offline".to_string()))
    } else {
        Ok(())
    }
}

impl LeadRegistry for FaultyStore {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, StoreError> {
        self.inner.insert_lead(lead)
    }

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, StoreError> {
        self.inner.fetch_lead(id)
    }

    fn active_leads(&self) -> Result<Vec<Lead>, StoreError> {
        self.inner.active_leads()
    }

    fn leads_created_by(&self, owner: &UserId) -> Result<Vec<Lead>, StoreError> {
        self.inner.leads_created_by(owner)
    }

    fn update_lead(&self, lead: Lead) -> Result<Lead, StoreError> {
        self.inner.update_lead(lead)
    }

    fn delete_lead(&self, id: &LeadId) -> Result<(), StoreError> {
        self.inner.delete_lead(id)
    }

    fn set_assignment(
        &self,
        id: &LeadId,
        assignment: Option<LeadAssignment>,
    ) -> Result<Lead, StoreError> {
        self.inner.set_assignment(id, assignment)
    }
}

impl ApplicationStore for FaultyStore {
    fn count_for_lead(&self, lead_id: &LeadId) -> Result<usize, StoreError> {
        self.inner.count_for_lead(lead_id)
    }

    fn find_for_applicant(
        &self,
        lead_id: &LeadId,
        applicant_id: &UserId,
    ) -> Result<Option<Application>, StoreError> {
        self.inner.find_for_applicant(lead_id, applicant_id)
    }

    fn accepted_for_lead(
        &self,
        lead_id: &LeadId,
        excluding: &ApplicationId,
    ) -> Result<Option<Application>, StoreError> {
        self.inner.accepted_for_lead(lead_id, excluding)
    }

    fn insert_application(&self, application: Application) -> Result<Application, StoreError> {
        self.inner.insert_application(application)
    }

    fn fetch_application(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError> {
        self.inner.fetch_application(id)
    }

    fn update_application_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Application, StoreError> {
        offline(&self.fail_status_writes)?;
        self.inner.update_application_status(id, status, updated_at)
    }

    fn delete_application(&self, id: &ApplicationId) -> Result<(), StoreError> {
        self.inner.delete_application(id)
    }

    fn applications_by_applicant(
        &self,
        applicant_id: &UserId,
    ) -> Result<Vec<Application>, StoreError> {
        self.inner.applications_by_applicant(applicant_id)
    }

    fn applications_for_leads(&self, lead_ids: &[LeadId]) -> Result<Vec<Application>, StoreError> {
        self.inner.applications_for_leads(lead_ids)
    }
}

impl LedgerStore for FaultyStore {
    fn profile(&self, id: &UserId) -> Result<Option<Profile>, StoreError> {
        self.inner.profile(id)
    }

    fn upsert_profile(&self, profile: Profile) -> Result<Profile, StoreError> {
        self.inner.upsert_profile(profile)
    }

    fn set_credits(&self, id: &UserId, credits: u64) -> Result<(), StoreError> {
        offline(&self.fail_credit_writes)?;
        self.inner.set_credits(id, credits)
    }

    fn append_transaction(
        &self,
        entry: NewCreditTransaction,
    ) -> Result<CreditTransaction, StoreError> {
        offline(&self.fail_ledger_appends)?;
        self.inner.append_transaction(entry)
    }

    fn transactions(&self, user_id: &UserId) -> Result<Vec<CreditTransaction>, StoreError> {
        self.inner.transactions(user_id)
    }
}

pub(super) async fn send(
    router: axum::Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize body"))
        }
        None => Body::empty(),
    };

    let response = router
        .oneshot(request.body(body).expect("request builds"))
        .await
        .expect("route executes");
    let status = response.status();
    (status, read_json_body(response).await)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
