use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::domain::{ApplicationId, Identity, LeadId, Role};
use super::error::MarketError;
use super::identity::{bearer_token, IdentityGate};
use super::leads::{BrowseQuery, LeadUpdate, NewLead};
use super::ledger::TopUp;
use super::payments::PaymentConfirmation;
use super::profiles::{NewProfile, ProfileDetails};
use super::service::MarketplaceService;
use super::store::MarketStore;
use super::workflow::PurchaseRequest;

type Reply = Result<(StatusCode, Json<Value>), MarketError>;

/// Router builder exposing profile, purchase, decision, credit and lead
/// endpoints.
pub fn market_router<S, I>(service: Arc<MarketplaceService<S, I>>) -> Router
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    Router::new()
        .route(
            "/api/auth/create-profile",
            post(create_profile_handler::<S, I>),
        )
        .route(
            "/api/auth/complete-profile",
            post(complete_profile_handler::<S, I>),
        )
        .route("/api/profile", get(profile_handler::<S, I>))
        .route(
            "/api/applications",
            get(list_applications_handler::<S, I>).post(create_application_handler::<S, I>),
        )
        .route(
            "/api/applications/:application_id",
            put(update_status_handler::<S, I>),
        )
        .route("/api/credits/update", post(update_credits_handler::<S, I>))
        .route("/api/credits/add", post(add_credits_handler::<S, I>))
        .route("/api/credits/balance", get(balance_handler::<S, I>))
        .route("/api/credits/history", get(history_handler::<S, I>))
        .route(
            "/api/credits/verify-payment",
            post(verify_payment_handler::<S, I>),
        )
        .route(
            "/api/leads",
            get(my_leads_handler::<S, I>).post(create_lead_handler::<S, I>),
        )
        .route("/api/leads/browse", get(browse_leads_handler::<S, I>))
        .route("/api/leads/browse/:lead_id", get(lead_handler::<S, I>))
        .route(
            "/api/leads/:lead_id",
            get(lead_detail_handler::<S, I>)
                .put(update_lead_handler::<S, I>)
                .delete(delete_lead_handler::<S, I>),
        )
        .with_state(service)
}

/// Authenticated caller resolved from the `Authorization` header.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

#[async_trait]
impl<S, I> FromRequestParts<Arc<MarketplaceService<S, I>>> for Caller
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        service: &Arc<MarketplaceService<S, I>>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(MarketError::Unauthenticated)?;

        service.authenticate(token).map(Caller)
    }
}

/// JSON body extractor whose rejections use the marketplace error body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(request, state)
            .await
            .map(|Json(value)| ValidJson(value))
            .map_err(|rejection| MarketError::Validation(rejection.body_text()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateApplicationBody {
    #[serde(default)]
    pub(crate) lead_id: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatusBody {
    #[serde(default)]
    pub(crate) status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateCreditsBody {
    #[serde(default)]
    pub(crate) credits: Option<i64>,
    #[serde(default)]
    pub(crate) payment_id: Option<String>,
    #[serde(default)]
    pub(crate) plan_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddCreditsBody {
    #[serde(default)]
    pub(crate) amount: Option<i64>,
    #[serde(default)]
    pub(crate) payment_id: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn lead_path(raw: &str) -> Result<LeadId, MarketError> {
    LeadId::parse(raw).ok_or(MarketError::NotFound("lead"))
}

pub(crate) async fn create_profile_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
    ValidJson(request): ValidJson<NewProfile>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let onboarding = service.profiles().create_profile(&caller, request).await?;
    let (status, message) = if onboarding.created {
        (StatusCode::CREATED, "Profile created successfully")
    } else {
        (StatusCode::OK, "Profile already exists")
    };
    Ok((
        status,
        Json(json!({
            "success": true,
            "message": message,
            "profile": onboarding.profile,
        })),
    ))
}

pub(crate) async fn complete_profile_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
    ValidJson(details): ValidJson<ProfileDetails>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let completion = service.profiles().complete_profile(&caller, details).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Profile completed successfully",
            "profile": completion.profile,
            "previousBalance": completion.bonus.previous_balance,
            "newBalance": completion.bonus.new_balance,
        })),
    ))
}

pub(crate) async fn profile_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let profile = service.profiles().profile(&caller)?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "profile": profile })),
    ))
}

pub(crate) async fn create_application_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
    ValidJson(body): ValidJson<CreateApplicationBody>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    if !caller.has_role(Role::LeadFinder) {
        return Err(MarketError::forbidden(
            "only lead-finder accounts can purchase leads",
        ));
    }
    let lead_id = match non_blank(body.lead_id) {
        Some(raw) => Some(lead_path(&raw)?),
        None => None,
    };
    let purchase = service
        .applications()
        .create_application(
            &caller,
            PurchaseRequest {
                lead_id,
                message: body.message,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Lead purchased successfully",
            "application": purchase.application,
            "remainingCredits": purchase.remaining_credits,
        })),
    ))
}

pub(crate) async fn list_applications_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let applications = service.applications().list_for(&caller)?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "applications": applications })),
    ))
}

pub(crate) async fn update_status_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
    Path(application_id): Path<String>,
    ValidJson(body): ValidJson<StatusBody>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let application_id =
        ApplicationId::parse(&application_id).ok_or(MarketError::NotFound("application"))?;
    let status = body.status.unwrap_or_default();
    let application = service
        .applications()
        .update_status(&caller, &application_id, &status)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": format!("Application {}", application.status.label()),
            "application": application,
        })),
    ))
}

pub(crate) async fn update_credits_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
    ValidJson(body): ValidJson<UpdateCreditsBody>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let amount = body
        .credits
        .filter(|credits| *credits > 0)
        .ok_or_else(|| MarketError::Validation("credit amount must be positive".to_string()))?;
    let payment_id = non_blank(body.payment_id)
        .ok_or_else(|| MarketError::Validation("payment ID required".to_string()))?;
    let plan = non_blank(body.plan_name).unwrap_or_else(|| "credit".to_string());

    let adjustment = service
        .credits()
        .top_up(
            &caller.id,
            TopUp {
                amount,
                payment_id: Some(payment_id),
                description: format!("Purchased {plan} plan"),
            },
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Credits updated successfully",
            "previousBalance": adjustment.previous_balance,
            "newBalance": adjustment.new_balance,
            "added": amount,
        })),
    ))
}

pub(crate) async fn add_credits_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
    ValidJson(body): ValidJson<AddCreditsBody>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let amount = body
        .amount
        .filter(|amount| *amount > 0)
        .ok_or_else(|| MarketError::Validation("credit amount must be positive".to_string()))?;

    let adjustment = service
        .credits()
        .top_up(
            &caller.id,
            TopUp {
                amount,
                payment_id: non_blank(body.payment_id),
                description: non_blank(body.description)
                    .unwrap_or_else(|| "Credit purchase".to_string()),
            },
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Credits added successfully",
            "previousBalance": adjustment.previous_balance,
            "newBalance": adjustment.new_balance,
            "added": amount,
        })),
    ))
}

pub(crate) async fn balance_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let credits = service.credits().balance(&caller.id)?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "credits": credits })),
    ))
}

pub(crate) async fn history_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let transactions = service.credits().history(&caller.id)?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "transactions": transactions })),
    ))
}

pub(crate) async fn verify_payment_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    ValidJson(confirmation): ValidJson<PaymentConfirmation>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    service.payments().verify(&confirmation)?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Payment verified successfully",
            "paymentId": confirmation.payment_id,
        })),
    ))
}

pub(crate) async fn create_lead_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
    ValidJson(draft): ValidJson<NewLead>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let lead = service.leads().create_lead(&caller, draft)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Lead created successfully",
            "lead": lead,
        })),
    ))
}

pub(crate) async fn browse_leads_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Query(query): Query<BrowseQuery>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let leads = service.leads().browse(&query)?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "count": leads.len(), "leads": leads })),
    ))
}

pub(crate) async fn lead_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Path(lead_id): Path<String>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let lead = service.leads().lead(&lead_path(&lead_id)?)?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "lead": lead }))))
}

pub(crate) async fn my_leads_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let leads = service.leads().leads_for(&caller)?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "leads": leads }))))
}

pub(crate) async fn lead_detail_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
    Path(lead_id): Path<String>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let detail = service
        .leads()
        .lead_detail(&caller, &lead_path(&lead_id)?)?;
    let mut body = json!({ "success": true, "lead": detail.lead });
    if let Some(applications) = detail.applications {
        body["applications"] = json!(applications);
    }
    if let Some(application) = detail.user_application {
        body["userApplication"] = json!(application);
    }
    Ok((StatusCode::OK, Json(body)))
}

pub(crate) async fn update_lead_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
    Path(lead_id): Path<String>,
    ValidJson(update): ValidJson<LeadUpdate>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    let lead = service
        .leads()
        .update_lead(&caller, &lead_path(&lead_id)?, update)
        .await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Lead updated successfully",
            "lead": lead,
        })),
    ))
}

pub(crate) async fn delete_lead_handler<S, I>(
    State(service): State<Arc<MarketplaceService<S, I>>>,
    Caller(caller): Caller,
    Path(lead_id): Path<String>,
) -> Reply
where
    S: MarketStore + 'static,
    I: IdentityGate + 'static,
{
    service
        .leads()
        .delete_lead(&caller, &lead_path(&lead_id)?)
        .await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Lead deleted successfully" })),
    ))
}
