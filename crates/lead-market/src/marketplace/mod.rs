//! Credit-gated lead marketplace: purchases, owner decisions, and the ledger.
//!
//! Persistence and authentication are collaborators behind the traits in
//! [`store`] and [`identity`]; everything here runs against an injected store
//! handle.

pub mod domain;
pub mod error;
pub mod identity;
pub mod leads;
pub mod ledger;
pub mod locks;
pub mod memory;
pub mod payments;
pub mod profiles;
pub mod router;
pub mod service;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationId, ApplicationStatus, CreditTransaction, Identity, Lead,
    LeadAssignment, LeadId, LeadStatus, NewCreditTransaction, Profile, Role, TransactionType,
    UserId,
};
pub use error::{ConflictReason, MarketError};
pub use identity::{IdentityGate, JwtIdentityGate};
pub use leads::{BrowseQuery, LeadApplication, LeadCatalog, LeadDetail, LeadUpdate, NewLead};
pub use ledger::{
    CreditAdjustment, CreditLedger, LedgerEntry, TopUp, PROFILE_COMPLETION_BONUS, SIGNUP_BONUS,
};
pub use locks::{KeyedLocks, LockKey};
pub use memory::InMemoryMarketStore;
pub use payments::{PaymentConfirmation, PaymentVerifier};
pub use profiles::{Completion, NewProfile, Onboarding, ProfileDetails, ProfileDirectory};
pub use router::{market_router, Caller, ValidJson};
pub use service::MarketplaceService;
pub use store::{ApplicationStore, LeadRegistry, LedgerStore, MarketStore, StoreError};
pub use workflow::{
    ApplicantSummary, ApplicationListing, ApplicationWorkflow, Purchase, PurchaseRequest,
    WorkflowConfig, DEFAULT_PURCHASE_MESSAGE, MAX_APPLICATIONS_PER_LEAD,
};
