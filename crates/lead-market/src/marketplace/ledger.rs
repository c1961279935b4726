use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{CreditTransaction, NewCreditTransaction, TransactionType, UserId};
use super::error::MarketError;
use super::locks::{KeyedLocks, LockKey};
use super::store::LedgerStore;

pub const SIGNUP_BONUS: u64 = 10;
pub const PROFILE_COMPLETION_BONUS: u64 = 15;

/// Metadata recorded alongside a balance change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub transaction_type: TransactionType,
    pub description: String,
    pub payment_id: Option<String>,
}

impl LedgerEntry {
    pub fn new(transaction_type: TransactionType, description: impl Into<String>) -> Self {
        Self {
            transaction_type,
            description: description.into(),
            payment_id: None,
        }
    }

    pub fn with_payment(mut self, payment_id: Option<String>) -> Self {
        self.payment_id = payment_id;
        self
    }

    pub(crate) fn signup_bonus() -> Self {
        Self::new(TransactionType::SignupBonus, "Welcome bonus")
    }

    pub(crate) fn profile_completion_bonus() -> Self {
        Self::new(TransactionType::ProfileCompletion, "Profile completion bonus")
    }
}

/// Result of one balance adjustment.
///
/// `transaction` is `None` when the ledger row could not be appended; the
/// balance has moved regardless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditAdjustment {
    pub previous_balance: u64,
    pub new_balance: u64,
    #[serde(skip)]
    pub transaction: Option<CreditTransaction>,
}

/// Top-up request confirmed by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopUp {
    pub amount: i64,
    pub payment_id: Option<String>,
    pub description: String,
}

/// Owner of every write to a profile's `credits`.
pub struct CreditLedger<S> {
    store: Arc<S>,
    locks: Arc<KeyedLocks>,
}

impl<S> CreditLedger<S>
where
    S: LedgerStore + 'static,
{
    pub fn new(store: Arc<S>, locks: Arc<KeyedLocks>) -> Self {
        Self { store, locks }
    }

    /// Apply `delta` to the user's balance and append one ledger row, as one
    /// unit under the user's lock.
    pub async fn adjust(
        &self,
        user_id: &UserId,
        delta: i64,
        entry: LedgerEntry,
    ) -> Result<CreditAdjustment, MarketError> {
        let _user = self.locks.acquire(LockKey::User(*user_id)).await;
        self.adjust_locked(user_id, delta, entry)
    }

    /// Same as [`CreditLedger::adjust`] for callers already holding the user lock.
    pub(crate) fn adjust_locked(
        &self,
        user_id: &UserId,
        delta: i64,
        entry: LedgerEntry,
    ) -> Result<CreditAdjustment, MarketError> {
        let profile = self
            .store
            .profile(user_id)?
            .ok_or(MarketError::NotFound("profile"))?;
        let previous_balance = profile.credits;
        let new_balance =
            apply_delta(previous_balance, delta).ok_or(MarketError::InsufficientFunds {
                required: delta.unsigned_abs(),
                available: previous_balance,
            })?;

        self.store.set_credits(user_id, new_balance)?;

        let transaction = match self.store.append_transaction(NewCreditTransaction {
            user_id: *user_id,
            amount: delta,
            transaction_type: entry.transaction_type,
            description: entry.description,
            payment_id: entry.payment_id,
        }) {
            Ok(transaction) => Some(transaction),
            Err(error) => {
                warn!(%user_id, delta, %error, "balance moved but ledger row was not recorded");
                None
            }
        };

        info!(
            %user_id,
            delta,
            previous_balance,
            new_balance,
            transaction_type = entry.transaction_type.label(),
            "credits adjusted"
        );

        Ok(CreditAdjustment {
            previous_balance,
            new_balance,
            transaction,
        })
    }

    /// Credit a confirmed payment.
    pub async fn top_up(
        &self,
        user_id: &UserId,
        top_up: TopUp,
    ) -> Result<CreditAdjustment, MarketError> {
        if top_up.amount <= 0 {
            return Err(MarketError::validation("credit amount must be positive"));
        }
        let entry = LedgerEntry::new(TransactionType::Purchase, top_up.description)
            .with_payment(top_up.payment_id);
        self.adjust(user_id, top_up.amount, entry).await
    }

    pub async fn grant_signup_bonus(
        &self,
        user_id: &UserId,
    ) -> Result<CreditAdjustment, MarketError> {
        self.adjust(user_id, SIGNUP_BONUS as i64, LedgerEntry::signup_bonus())
            .await
    }

    pub async fn grant_profile_completion_bonus(
        &self,
        user_id: &UserId,
    ) -> Result<CreditAdjustment, MarketError> {
        self.adjust(
            user_id,
            PROFILE_COMPLETION_BONUS as i64,
            LedgerEntry::profile_completion_bonus(),
        )
        .await
    }

    pub fn balance(&self, user_id: &UserId) -> Result<u64, MarketError> {
        let profile = self
            .store
            .profile(user_id)?
            .ok_or(MarketError::NotFound("profile"))?;
        Ok(profile.credits)
    }

    /// Ledger rows for the user, newest first.
    pub fn history(&self, user_id: &UserId) -> Result<Vec<CreditTransaction>, MarketError> {
        Ok(self.store.transactions(user_id)?)
    }
}

/// `None` when the result would be negative or overflow.
fn apply_delta(balance: u64, delta: i64) -> Option<u64> {
    if delta >= 0 {
        balance.checked_add(delta.unsigned_abs())
    } else {
        balance.checked_sub(delta.unsigned_abs())
    }
}
