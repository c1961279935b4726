use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(raw: &str) -> Option<Self> {
                Uuid::parse_str(raw.trim()).ok().map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a marketplace user, shared with the identity provider.
    UserId
);
uuid_id!(
    /// Identifier of a posted lead.
    LeadId
);
uuid_id!(
    /// Identifier of a purchase/application row.
    ApplicationId
);

/// Marketplace role carried by a profile.
///
/// Finders purchase leads; appliers post them and decide acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "lead-finder")]
    LeadFinder,
    #[serde(rename = "lead-applier")]
    LeadApplier,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "lead-finder" => Some(Self::LeadFinder),
            "lead-applier" => Some(Self::LeadApplier),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Role::LeadFinder => "lead-finder",
            Role::LeadApplier => "lead-applier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Active,
    Closed,
    Expired,
}

impl LeadStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            LeadStatus::Active => "active",
            LeadStatus::Closed => "closed",
            LeadStatus::Expired => "expired",
        }
    }
}

/// A posted opportunity that finders pay credits to access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub credit_cost: u64,
    pub status: LeadStatus,
    pub created_by: UserId,
    pub assigned_to: Option<UserId>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn is_active(&self) -> bool {
        self.status == LeadStatus::Active
    }

    pub fn assignment(&self) -> Option<LeadAssignment> {
        match (self.assigned_to, self.assigned_at) {
            (Some(applicant_id), Some(assigned_at)) => Some(LeadAssignment {
                applicant_id,
                assigned_at,
            }),
            _ => None,
        }
    }
}

/// Applicant a lead has been handed to by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadAssignment {
    pub applicant_id: UserId,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

/// One finder's paid claim on one lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub lead_id: LeadId,
    pub applicant_id: UserId,
    pub message: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Marketplace profile holding the credit balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
    pub credits: u64,
    /// Set once the completion bonus has been granted.
    #[serde(default)]
    pub profile_completed: bool,
}

/// Reason a ledger row was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    LeadPurchase,
    Purchase,
    SignupBonus,
    ProfileCompletion,
}

impl TransactionType {
    pub const fn label(self) -> &'static str {
        match self {
            TransactionType::LeadPurchase => "lead_purchase",
            TransactionType::Purchase => "purchase",
            TransactionType::SignupBonus => "signup_bonus",
            TransactionType::ProfileCompletion => "profile_completion",
        }
    }
}

/// Append-only ledger row; one per balance-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub description: String,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger row before the store assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCreditTransaction {
    pub user_id: UserId,
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub description: String,
    pub payment_id: Option<String>,
}

/// Caller resolved by the identity gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub role: Option<Role>,
}

impl Identity {
    pub fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            role: Some(role),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }
}
