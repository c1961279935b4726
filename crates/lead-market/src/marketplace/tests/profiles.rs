use super::common::*;
use std::sync::atomic::Ordering;

use crate::marketplace::domain::{Identity, Role, TransactionType, UserId};
use crate::marketplace::error::{ConflictReason, MarketError};
use crate::marketplace::ledger::{PROFILE_COMPLETION_BONUS, SIGNUP_BONUS};
use crate::marketplace::profiles::{NewProfile, ProfileDetails};
use crate::marketplace::store::LedgerStore;

fn newcomer() -> Identity {
    Identity {
        id: UserId::new(),
        role: None,
    }
}

fn signup(role: &str) -> NewProfile {
    NewProfile {
        user_id: None,
        display_name: "Dana Whitfield".to_string(),
        role: role.to_string(),
    }
}

#[tokio::test]
async fn create_profile_grants_the_signup_bonus_once() {
    let h = harness();
    let caller = newcomer();
    let profiles = h.service.profiles();

    let onboarding = profiles
        .create_profile(&caller, signup("lead-finder"))
        .await
        .expect("profile created");
    assert!(onboarding.created);
    assert_eq!(onboarding.profile.role, Role::LeadFinder);
    assert_eq!(onboarding.profile.credits, SIGNUP_BONUS);
    assert!(!onboarding.profile.profile_completed);

    let again = profiles
        .create_profile(&caller, signup("lead-applier"))
        .await
        .expect("existing profile returned");
    assert!(!again.created);
    assert_eq!(again.profile.role, Role::LeadFinder);
    assert_eq!(again.profile.credits, SIGNUP_BONUS);

    let history = h.store.transactions(&caller.id).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].transaction_type, TransactionType::SignupBonus);
    assert_eq!(history[0].description, "Welcome bonus");
}

#[tokio::test]
async fn create_profile_validates_role_name_and_owner() {
    let h = harness();
    let caller = newcomer();
    let profiles = h.service.profiles();

    for request in [
        signup("admin"),
        NewProfile {
            display_name: "   ".to_string(),
            ..signup("lead-finder")
        },
    ] {
        let result = profiles.create_profile(&caller, request).await;
        assert!(matches!(result, Err(MarketError::Validation(_))), "{result:?}");
    }

    let impersonation = profiles
        .create_profile(
            &caller,
            NewProfile {
                user_id: Some(UserId::new()),
                ..signup("lead-finder")
            },
        )
        .await;
    assert!(matches!(impersonation, Err(MarketError::Forbidden(_))));
    assert!(h.store.profile(&caller.id).expect("lookup").is_none());
}

#[tokio::test]
async fn profile_survives_a_failed_signup_bonus() {
    let h = faulty_harness();
    h.store.fail_credit_writes.store(true, Ordering::SeqCst);
    let caller = newcomer();

    let onboarding = h
        .service
        .profiles()
        .create_profile(&caller, signup("lead-applier"))
        .await
        .expect("profile kept");

    assert!(onboarding.created);
    assert_eq!(onboarding.profile.credits, 0);
    assert!(h.store.profile(&caller.id).expect("lookup").is_some());
    assert!(h.store.transactions(&caller.id).expect("history").is_empty());
}

#[tokio::test]
async fn complete_profile_pays_out_only_the_first_time() {
    let h = harness();
    let caller = newcomer();
    let profiles = h.service.profiles();
    profiles
        .create_profile(&caller, signup("lead-finder"))
        .await
        .expect("profile created");

    let completion = profiles
        .complete_profile(
            &caller,
            ProfileDetails {
                user_id: Some(caller.id),
                display_name: Some("Dana W.".to_string()),
            },
        )
        .await
        .expect("completed");
    assert_eq!(completion.bonus.previous_balance, SIGNUP_BONUS);
    assert_eq!(
        completion.bonus.new_balance,
        SIGNUP_BONUS + PROFILE_COMPLETION_BONUS
    );
    assert_eq!(completion.profile.display_name, "Dana W.");
    assert!(completion.profile.profile_completed);

    let repeat = profiles
        .complete_profile(&caller, ProfileDetails::default())
        .await;
    assert!(matches!(
        repeat,
        Err(MarketError::Conflict(ConflictReason::ProfileCompleted))
    ));

    let types: Vec<_> = h
        .store
        .transactions(&caller.id)
        .expect("history")
        .into_iter()
        .map(|row| row.transaction_type)
        .collect();
    assert_eq!(
        types,
        vec![TransactionType::ProfileCompletion, TransactionType::SignupBonus]
    );
}

#[tokio::test]
async fn failed_completion_bonus_leaves_profile_incomplete() {
    let h = faulty_harness();
    let finder = h.finder(3);
    h.store.fail_credit_writes.store(true, Ordering::SeqCst);

    let result = h
        .service
        .profiles()
        .complete_profile(&finder, ProfileDetails::default())
        .await;
    assert!(matches!(result, Err(MarketError::Store(_))), "{result:?}");

    let stored = h
        .store
        .profile(&finder.id)
        .expect("lookup")
        .expect("present");
    assert!(!stored.profile_completed);
    assert_eq!(stored.credits, 3);

    h.store.fail_credit_writes.store(false, Ordering::SeqCst);
    let completion = h
        .service
        .profiles()
        .complete_profile(&finder, ProfileDetails::default())
        .await
        .expect("retry completes");
    assert_eq!(completion.bonus.new_balance, 3 + PROFILE_COMPLETION_BONUS);
}

#[tokio::test]
async fn complete_profile_requires_an_existing_profile() {
    let h = harness();
    let result = h
        .service
        .profiles()
        .complete_profile(&newcomer(), ProfileDetails::default())
        .await;
    assert!(matches!(result, Err(MarketError::NotFound("profile"))));
}
