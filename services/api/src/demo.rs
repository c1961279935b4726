use crate::infra::{build_marketplace, Marketplace};
use clap::Args;
use lead_market::config::AppConfig;
use lead_market::error::AppError;
use lead_market::marketplace::{
    Identity, InMemoryMarketStore, MarketError, NewLead, NewProfile, PaymentConfirmation,
    PurchaseRequest, Role, TopUp, UserId,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Credit cost of the demo lead.
    #[arg(long, default_value_t = 5)]
    pub(crate) lead_cost: u64,
    /// Number of finders competing for the lead.
    #[arg(long, default_value_t = 3)]
    pub(crate) finders: usize,
    /// Credits bought through the simulated payment gateway by each finder.
    #[arg(long, default_value_t = 0)]
    pub(crate) top_up: i64,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        lead_cost,
        finders,
        top_up,
    } = args;

    let config = AppConfig::load()?;
    let market = build_marketplace(&config, Arc::new(InMemoryMarketStore::default()));

    println!("Lead marketplace demo");
    let owner = register(&market, "Brightline Renovations", Role::LeadApplier).await?;
    let lead = market.leads().create_lead(
        &owner,
        NewLead {
            title: "Full kitchen remodel".to_string(),
            description: "Homeowner wants cabinets, counters and lighting replaced".to_string(),
            category: "home-improvement".to_string(),
            location: Some("Austin".to_string()),
            credit_cost: lead_cost,
        },
    )?;
    println!(
        "- Posted lead '{}' ({} credits, {} seats)",
        lead.title,
        lead.credit_cost,
        market.applications().config().max_applications_per_lead
    );

    let mut buyers = Vec::with_capacity(finders);
    for index in 0..finders {
        let finder = register(&market, &format!("Finder {}", index + 1), Role::LeadFinder).await?;
        if top_up > 0 {
            buy_credits(&market, &finder, top_up, index).await?;
        }
        buyers.push(finder);
    }

    let mut purchased = Vec::new();
    for (index, finder) in buyers.iter().enumerate() {
        let request = PurchaseRequest {
            lead_id: Some(lead.id),
            message: None,
        };
        match market.applications().create_application(finder, request).await {
            Ok(purchase) => {
                println!(
                    "- Finder {} purchased the lead; {} credits remain",
                    index + 1,
                    purchase.remaining_credits
                );
                purchased.push(purchase.application);
            }
            Err(err) => println!("- Finder {} could not purchase: {}", index + 1, err),
        }
    }

    if let [first, second, ..] = purchased.as_slice() {
        match market
            .applications()
            .update_status(&owner, &second.id, "accepted")
            .await
        {
            Err(MarketError::Conflict(reason)) => println!(
                "- Accepting a second buyer was refused ({}) while {} holds the lead",
                reason.code(),
                first.applicant_id
            ),
            Err(err) => println!("- Acceptance failed: {err}"),
            Ok(_) => println!("- Second buyer accepted"),
        }
    }

    let listings = market.applications().list_for(&owner)?;
    let ledgers = buyers
        .iter()
        .map(|finder| -> Result<serde_json::Value, MarketError> {
            Ok(json!({
                "user": finder.id,
                "credits": market.credits().balance(&finder.id)?,
                "transactions": market.credits().history(&finder.id)?,
            }))
        })
        .collect::<Result<Vec<_>, MarketError>>()?;

    let report = json!({
        "lead": market.leads().lead(&lead.id)?,
        "applications": listings,
        "ledgers": ledgers,
    });
    match serde_json::to_string_pretty(&report) {
        Ok(rendered) => println!("\nMarketplace state:\n{rendered}"),
        Err(err) => println!("\nMarketplace state unavailable: {err}"),
    }

    Ok(())
}

async fn register(
    market: &Marketplace,
    display_name: &str,
    role: Role,
) -> Result<Identity, AppError> {
    let caller = Identity {
        id: UserId::new(),
        role: None,
    };
    let onboarding = market
        .profiles()
        .create_profile(
            &caller,
            NewProfile {
                user_id: Some(caller.id),
                display_name: display_name.to_string(),
                role: role.label().to_string(),
            },
        )
        .await?;
    println!(
        "- Registered {} as {} with {} welcome credits",
        display_name,
        role.label(),
        onboarding.profile.credits
    );
    Ok(Identity::new(caller.id, role))
}

async fn buy_credits(
    market: &Marketplace,
    finder: &Identity,
    amount: i64,
    index: usize,
) -> Result<(), AppError> {
    let order_id = format!("order_demo_{index}");
    let payment_id = format!("pay_demo_{index}");
    let signature = market.payments().sign(&order_id, &payment_id)?;
    market.payments().verify(&PaymentConfirmation {
        order_id,
        payment_id: payment_id.clone(),
        signature,
    })?;

    let adjustment = market
        .credits()
        .top_up(
            &finder.id,
            TopUp {
                amount,
                payment_id: Some(payment_id),
                description: "Purchased demo plan".to_string(),
            },
        )
        .await?;
    println!(
        "  verified payment; balance {} -> {}",
        adjustment.previous_balance, adjustment.new_balance
    );
    Ok(())
}
