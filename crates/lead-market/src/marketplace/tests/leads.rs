use super::common::*;

use crate::marketplace::domain::{Identity, LeadId, LeadStatus, Role, UserId};
use crate::marketplace::error::MarketError;
use crate::marketplace::leads::{BrowseQuery, LeadUpdate, NewLead};
use crate::marketplace::store::{ApplicationStore, LeadRegistry};
use crate::marketplace::workflow::PurchaseRequest;

fn draft(title: &str, category: &str, location: Option<&str>) -> NewLead {
    NewLead {
        title: title.to_string(),
        description: format!("{title} for a family home"),
        category: category.to_string(),
        location: location.map(str::to_string),
        credit_cost: 3,
    }
}

#[test]
fn create_lead_validates_required_fields() {
    let h = harness();
    let owner = h.applier();
    let catalog = h.service.leads();

    let mut missing_title = draft("Deck repair", "carpentry", None);
    missing_title.title = "  ".to_string();
    assert!(matches!(
        catalog.create_lead(&owner, missing_title),
        Err(MarketError::Validation(_))
    ));

    let mut free = draft("Deck repair", "carpentry", None);
    free.credit_cost = 0;
    assert!(matches!(
        catalog.create_lead(&owner, free),
        Err(MarketError::Validation(_))
    ));

    let finder = h.profile(Role::LeadFinder, 0);
    assert!(matches!(
        catalog.create_lead(&finder, draft("Deck repair", "carpentry", None)),
        Err(MarketError::Forbidden(_))
    ));
}

#[test]
fn create_lead_defaults_location_and_starts_active() {
    let h = harness();
    let owner = h.applier();

    let lead = h
        .service
        .leads()
        .create_lead(&owner, draft("Deck repair", "carpentry", Some("")))
        .expect("lead created");

    assert_eq!(lead.location, "Remote");
    assert_eq!(lead.status, LeadStatus::Active);
    assert_eq!(lead.created_by, owner.id);
    assert!(lead.assigned_to.is_none());
}

#[test]
fn browse_filters_and_paginates_active_leads() {
    let h = harness();
    let owner = h.applier();
    let catalog = h.service.leads();

    for (title, category, location) in [
        ("Deck repair", "carpentry", "Denver"),
        ("Cabinet install", "carpentry", "Boulder"),
        ("Pipe leak", "plumbing", "Denver"),
    ] {
        catalog
            .create_lead(&owner, draft(title, category, Some(location)))
            .expect("lead created");
    }
    h.lead_with_status(&owner, 2, LeadStatus::Expired);

    let all = catalog.browse(&BrowseQuery::default()).expect("browse");
    assert_eq!(all.len(), 3);

    let carpentry = catalog
        .browse(&BrowseQuery {
            category: Some("carpentry".to_string()),
            ..BrowseQuery::default()
        })
        .expect("browse");
    assert_eq!(carpentry.len(), 2);

    let denver_search = catalog
        .browse(&BrowseQuery {
            location: Some("Denver".to_string()),
            search: Some("LEAK".to_string()),
            ..BrowseQuery::default()
        })
        .expect("browse");
    assert_eq!(denver_search.len(), 1);
    assert_eq!(denver_search[0].title, "Pipe leak");

    let page = catalog
        .browse(&BrowseQuery {
            limit: Some(1),
            offset: Some(1),
            ..BrowseQuery::default()
        })
        .expect("browse");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, all[1].id);
}

#[tokio::test]
async fn owner_can_close_a_lead_and_purchases_stop() {
    let h = harness();
    let owner = h.applier();
    let finder = h.finder(10);
    let lead = h.lead(&owner, 2);

    let closed = h
        .service
        .leads()
        .update_lead(
            &owner,
            &lead.id,
            LeadUpdate {
                title: Some("Kitchen remodel (filled)".to_string()),
                status: Some("closed".to_string()),
                ..LeadUpdate::default()
            },
        )
        .await
        .expect("owner edit");
    assert_eq!(closed.status, LeadStatus::Closed);
    assert_eq!(closed.title, "Kitchen remodel (filled)");
    assert_eq!(closed.credit_cost, 2);
    assert_eq!(h.stored_lead(&lead.id).status, LeadStatus::Closed);

    let result = h
        .service
        .applications()
        .create_application(
            &finder,
            PurchaseRequest {
                lead_id: Some(lead.id),
                message: None,
            },
        )
        .await;
    assert!(matches!(result, Err(MarketError::NotFound("lead"))));
    assert_eq!(h.credits(&finder), 10);

    let expired = h
        .service
        .leads()
        .update_lead(
            &owner,
            &lead.id,
            LeadUpdate {
                status: Some("expired".to_string()),
                ..LeadUpdate::default()
            },
        )
        .await
        .expect("expire");
    assert_eq!(expired.status, LeadStatus::Expired);
}

#[tokio::test]
async fn update_rejects_strangers_and_bad_fields() {
    let h = harness();
    let owner = h.applier();
    let rival = h.applier();
    let finder = h.finder(0);
    let lead = h.lead(&owner, 2);
    let catalog = h.service.leads();

    for caller in [rival, finder] {
        let result = catalog
            .update_lead(&caller, &lead.id, LeadUpdate::default())
            .await;
        assert!(matches!(result, Err(MarketError::Forbidden(_))), "{result:?}");
    }

    for update in [
        LeadUpdate {
            status: Some("archived".to_string()),
            ..LeadUpdate::default()
        },
        LeadUpdate {
            credit_cost: Some(0),
            ..LeadUpdate::default()
        },
        LeadUpdate {
            category: Some(" ".to_string()),
            ..LeadUpdate::default()
        },
    ] {
        let result = catalog.update_lead(&owner, &lead.id, update).await;
        assert!(matches!(result, Err(MarketError::Validation(_))), "{result:?}");
    }

    let missing = catalog
        .update_lead(&owner, &LeadId::new(), LeadUpdate::default())
        .await;
    assert!(matches!(missing, Err(MarketError::NotFound("lead"))));
    assert_eq!(h.stored_lead(&lead.id), lead);
}

#[tokio::test]
async fn delete_removes_the_lead_and_its_applications() {
    let h = harness();
    let owner = h.applier();
    let finder = h.finder(5);
    let lead = h.lead(&owner, 2);
    h.service
        .applications()
        .create_application(
            &finder,
            PurchaseRequest {
                lead_id: Some(lead.id),
                message: None,
            },
        )
        .await
        .expect("purchase");

    let rival = h.applier();
    assert!(matches!(
        h.service.leads().delete_lead(&rival, &lead.id).await,
        Err(MarketError::Forbidden(_))
    ));

    h.service
        .leads()
        .delete_lead(&owner, &lead.id)
        .await
        .expect("owner deletes");
    assert!(h.store.fetch_lead(&lead.id).expect("lookup").is_none());
    assert_eq!(h.store.count_for_lead(&lead.id).expect("count"), 0);
    assert!(matches!(
        h.service.leads().delete_lead(&owner, &lead.id).await,
        Err(MarketError::NotFound("lead"))
    ));
}

#[test]
fn leads_for_depends_on_role() {
    let h = harness();
    let owner = h.applier();
    let other_owner = h.applier();
    let mine = h.lead_with_status(&owner, 2, LeadStatus::Closed);
    let theirs = h.lead(&other_owner, 3);
    let catalog = h.service.leads();

    let owned = catalog.leads_for(&owner).expect("owned");
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, mine.id);

    let finder = h.finder(0);
    let visible = catalog.leads_for(&finder).expect("active");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, theirs.id);

    let anonymous = Identity {
        id: UserId::new(),
        role: None,
    };
    assert_eq!(catalog.leads_for(&anonymous).expect("active").len(), 1);
}

#[tokio::test]
async fn lead_detail_shows_each_role_its_own_view() {
    let h = harness();
    let owner = h.applier();
    let buyer = h.finder(5);
    let browser = h.finder(5);
    let lead = h.lead(&owner, 2);
    let purchase = h
        .service
        .applications()
        .create_application(
            &buyer,
            PurchaseRequest {
                lead_id: Some(lead.id),
                message: Some("Available next week".to_string()),
            },
        )
        .await
        .expect("purchase");
    let catalog = h.service.leads();

    let owner_view = catalog.lead_detail(&owner, &lead.id).expect("owner view");
    let applications = owner_view.applications.expect("owner sees applications");
    assert_eq!(applications.len(), 1);
    assert_eq!(applications[0].application.id, purchase.application.id);
    assert_eq!(
        applications[0].applicant.as_ref().map(|applicant| applicant.id),
        Some(buyer.id)
    );
    assert!(owner_view.user_application.is_none());

    let buyer_view = catalog.lead_detail(&buyer, &lead.id).expect("buyer view");
    assert!(buyer_view.applications.is_none());
    assert_eq!(
        buyer_view.user_application.map(|application| application.id),
        Some(purchase.application.id)
    );

    let browser_view = catalog.lead_detail(&browser, &lead.id).expect("browser view");
    assert!(browser_view.user_application.is_none());

    let rival = h.applier();
    assert!(matches!(
        catalog.lead_detail(&rival, &lead.id),
        Err(MarketError::Forbidden(_))
    ));
}
