//! Billing handlers: recharge initiation and balance lookup.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{BalanceResponse, RechargeRequest, RechargeResponse};
use crate::app_state::AppState;
use crate::domain::{AgencyId, pack};
use crate::error::{ErrorResponse, MarketError};

/// `POST /billing/recharge` — Initiate a balance recharge.
///
/// The balance is never credited here: production credits land only
/// through the payment gateway's checkout flow, confirmed by the
/// signed webhook. This endpoint validates the request and answers
/// with a pending-checkout instruction.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] for a non-positive amount,
/// [`MarketError::AgencyNotFound`] for an unknown agency.
#[utoipa::path(
    post,
    path = "/api/v1/billing/recharge",
    tag = "Billing",
    summary = "Initiate a CPC recharge",
    description = "Validates the recharge request and directs the client to the payment \
                   gateway's checkout. The credit is applied by the webhook, never here.",
    request_body = RechargeRequest,
    responses(
        (status = 202, description = "Checkout pending", body = RechargeResponse),
        (status = 404, description = "Agency not found", body = ErrorResponse),
    )
)]
pub async fn recharge(
    State(state): State<AppState>,
    Json(req): Json<RechargeRequest>,
) -> Result<impl IntoResponse, MarketError> {
    if req.amount_cents <= 0 {
        return Err(MarketError::Validation(format!(
            "recharge amount must be positive, got {}",
            req.amount_cents
        )));
    }
    let agency_id = AgencyId::from_uuid(req.agency_id);
    state
        .store
        .get_agency(agency_id)
        .await?
        .ok_or(MarketError::AgencyNotFound(req.agency_id))?;

    tracing::info!(%agency_id, amount_cents = req.amount_cents, "recharge checkout requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(RechargeResponse {
            status: "pending_checkout".to_string(),
            agency_id: req.agency_id,
            amount_cents: req.amount_cents,
            message: "complete the payment through the checkout flow; the balance is credited \
                      when the payment gateway confirms"
                .to_string(),
        }),
    ))
}

/// `GET /billing/{agency_id}/balance` — CPC account snapshot.
///
/// # Errors
///
/// Returns [`MarketError::AgencyNotFound`] for an unknown agency.
#[utoipa::path(
    get,
    path = "/api/v1/billing/{agency_id}/balance",
    tag = "Billing",
    summary = "CPC account snapshot",
    description = "Returns the agency's balance, spend, effective click price, and advisory \
                   monthly click counter.",
    params(
        ("agency_id" = uuid::Uuid, Path, description = "Agency UUID"),
    ),
    responses(
        (status = 200, description = "Account snapshot", body = BalanceResponse),
        (status = 404, description = "Agency not found", body = ErrorResponse),
    )
)]
pub async fn balance(
    State(state): State<AppState>,
    Path(agency_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MarketError> {
    let agency = state
        .store
        .get_agency(AgencyId::from_uuid(agency_id))
        .await?
        .ok_or(MarketError::AgencyNotFound(agency_id))?;

    let tier = agency.subscription.pack;
    Ok(Json(BalanceResponse {
        agency_id,
        balance_cents: agency.cpc.balance_cents,
        total_spent_cents: agency.cpc.total_spent_cents,
        cost_per_click_cents: agency.cpc.cost_per_click_cents,
        effective_cost_per_click_cents: pack::effective_cpc_price(
            tier,
            agency.cpc.cost_per_click_cents,
        ),
        clicks_this_month: agency.cpc.clicks_this_month,
        last_recharge_at: agency.cpc.last_recharge_at,
        pack: tier.as_str().to_string(),
    }))
}

/// Billing routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/billing/recharge", post(recharge))
        .route("/billing/{agency_id}/balance", get(balance))
}
