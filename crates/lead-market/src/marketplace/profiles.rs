use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::domain::{Identity, Profile, Role, UserId};
use super::error::{ConflictReason, MarketError};
use super::ledger::{
    CreditAdjustment, CreditLedger, LedgerEntry, PROFILE_COMPLETION_BONUS, SIGNUP_BONUS,
};
use super::locks::{KeyedLocks, LockKey};
use super::store::LedgerStore;

/// Signup details for an authenticated caller without a profile yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    /// When present it must name the authenticated caller.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: String,
}

/// Details supplied when a user finishes their profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Outcome of a create-profile call; `created` is false when the profile
/// already existed and was returned untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Onboarding {
    pub profile: Profile,
    pub created: bool,
}

/// Profile after the completion bonus was granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub profile: Profile,
    pub bonus: CreditAdjustment,
}

/// Creates and completes profiles, granting the one-off onboarding bonuses.
pub struct ProfileDirectory<S> {
    store: Arc<S>,
    ledger: Arc<CreditLedger<S>>,
    locks: Arc<KeyedLocks>,
}

impl<S> ProfileDirectory<S>
where
    S: LedgerStore + 'static,
{
    pub fn new(store: Arc<S>, ledger: Arc<CreditLedger<S>>, locks: Arc<KeyedLocks>) -> Self {
        Self {
            store,
            ledger,
            locks,
        }
    }

    pub fn profile(&self, caller: &Identity) -> Result<Profile, MarketError> {
        self.store
            .profile(&caller.id)?
            .ok_or(MarketError::NotFound("profile"))
    }

    /// Create the caller's profile with a zero balance, then grant the
    /// signup bonus. An existing profile is returned as is.
    ///
    /// A failed bonus grant is logged and the profile is kept.
    pub async fn create_profile(
        &self,
        caller: &Identity,
        request: NewProfile,
    ) -> Result<Onboarding, MarketError> {
        ensure_self(caller, request.user_id)?;
        let role = Role::parse(&request.role).ok_or_else(|| {
            MarketError::validation("role must be 'lead-finder' or 'lead-applier'")
        })?;
        let display_name = request.display_name.trim();
        if display_name.is_empty() {
            return Err(MarketError::validation("display name is required"));
        }

        let _user = self.locks.acquire(LockKey::User(caller.id)).await;
        if let Some(existing) = self.store.profile(&caller.id)? {
            return Ok(Onboarding {
                profile: existing,
                created: false,
            });
        }

        let mut profile = self.store.upsert_profile(Profile {
            id: caller.id,
            display_name: display_name.to_string(),
            role,
            credits: 0,
            profile_completed: false,
        })?;

        match self
            .ledger
            .adjust_locked(&caller.id, SIGNUP_BONUS as i64, LedgerEntry::signup_bonus())
        {
            Ok(bonus) => profile.credits = bonus.new_balance,
            Err(failure) => {
                warn!(user_id = %caller.id, %failure, "profile created without signup bonus")
            }
        }

        info!(
            user_id = %caller.id,
            role = role.label(),
            credits = profile.credits,
            "profile created"
        );
        Ok(Onboarding {
            profile,
            created: true,
        })
    }

    /// Mark the caller's profile complete and grant the completion bonus.
    /// Only the first completion pays out.
    pub async fn complete_profile(
        &self,
        caller: &Identity,
        details: ProfileDetails,
    ) -> Result<Completion, MarketError> {
        ensure_self(caller, details.user_id)?;

        let _user = self.locks.acquire(LockKey::User(caller.id)).await;
        let previous = self.profile(caller)?;
        if previous.profile_completed {
            return Err(MarketError::Conflict(ConflictReason::ProfileCompleted));
        }

        let mut profile = previous.clone();
        if let Some(name) = details
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            profile.display_name = name.to_string();
        }
        profile.profile_completed = true;
        self.store.upsert_profile(profile)?;

        let bonus = match self.ledger.adjust_locked(
            &caller.id,
            PROFILE_COMPLETION_BONUS as i64,
            LedgerEntry::profile_completion_bonus(),
        ) {
            Ok(bonus) => bonus,
            Err(failure) => {
                if let Err(rollback) = self.store.upsert_profile(previous) {
                    error!(user_id = %caller.id, %rollback, "failed to restore profile");
                }
                return Err(failure);
            }
        };

        info!(user_id = %caller.id, credits = bonus.new_balance, "profile completed");
        Ok(Completion {
            profile: self.profile(caller)?,
            bonus,
        })
    }
}

fn ensure_self(caller: &Identity, claimed: Option<UserId>) -> Result<(), MarketError> {
    match claimed {
        Some(user_id) if user_id != caller.id => Err(MarketError::forbidden(
            "user ID does not match authenticated user",
        )),
        _ => Ok(()),
    }
}
