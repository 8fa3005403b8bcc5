//! Listing submission and click-billing handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{ClickResponse, SubmitListingRequest, SubmitListingResponse};
use crate::app_state::AppState;
use crate::domain::{AgencyId, EnergyClass, GeoPoint, PropertyType};
use crate::error::{ErrorResponse, MarketError};
use crate::service::submission::ListingDraft;

/// `POST /listings` — Submit a new listing.
///
/// # Errors
///
/// Returns [`MarketError::QuotaExceeded`] when the agency's pack limit
/// is reached, [`MarketError::Authorization`] for unverified or
/// suspended agencies, [`MarketError::Validation`] otherwise.
#[utoipa::path(
    post,
    path = "/api/v1/listings",
    tag = "Listings",
    summary = "Submit a listing",
    description = "Creates a listing under the owning agency's pack policy: quota is enforced \
                   and qualifying packs grant an automatic sponsorship window.",
    request_body = SubmitListingRequest,
    responses(
        (status = 201, description = "Listing created", body = SubmitListingResponse),
        (status = 403, description = "Agency not allowed to submit", body = ErrorResponse),
        (status = 422, description = "Listing quota reached", body = ErrorResponse),
    )
)]
pub async fn submit_listing(
    State(state): State<AppState>,
    Json(req): Json<SubmitListingRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let draft = parse_draft(req)?;
    let listing = state.submission.submit(draft).await?;

    let response = SubmitListingResponse {
        listing_id: listing.id,
        status: listing.status.as_str().to_string(),
        is_sponsored: listing.is_sponsored,
        sponsored_until: listing.sponsored_until,
        created_at: listing.published_at,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /listings/{id}/click` — Bill a click on a sponsored listing.
///
/// # Errors
///
/// Returns [`MarketError::ListingNotFound`] for an unknown listing.
/// Insufficient funds is a 200 with `billed: false`.
#[utoipa::path(
    post,
    path = "/api/v1/listings/{id}/click",
    tag = "Listings",
    summary = "Record a sponsored click",
    description = "Debits the owning agency's CPC balance for one click. A declined debit \
                   (insufficient funds, unsponsored listing) still answers 200.",
    params(
        ("id" = uuid::Uuid, Path, description = "Listing UUID"),
    ),
    responses(
        (status = 200, description = "Billing outcome", body = ClickResponse),
        (status = 404, description = "Listing not found", body = ErrorResponse),
    )
)]
pub async fn click_listing(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MarketError> {
    let listing_id = crate::domain::ListingId::from_uuid(id);
    let listing = state
        .store
        .get_listing(listing_id)
        .await?
        .ok_or(MarketError::ListingNotFound(id))?;

    let billing = state.ledger.bill_click(&listing).await?;
    Ok(Json(ClickResponse {
        billed: billing.billed,
        price_cents: billing.price_cents,
    }))
}

/// Listing routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/listings", post(submit_listing))
        .route("/listings/{id}/click", post(click_listing))
}

// ── Request Parsing Helpers ─────────────────────────────────────────────

fn parse_draft(req: SubmitListingRequest) -> Result<ListingDraft, MarketError> {
    let property_type = PropertyType::parse(&req.property_type).ok_or_else(|| {
        MarketError::Validation(format!("unknown property type: {}", req.property_type))
    })?;
    let dpe_class = parse_class(req.dpe_class.as_deref(), "dpe_class")?;
    let ges_class = parse_class(req.ges_class.as_deref(), "ges_class")?;

    let point = match (req.lat, req.lon) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
        (None, None) => None,
        _ => {
            return Err(MarketError::Validation(
                "lat and lon must be provided together".to_string(),
            ));
        }
    };

    // Metropolitan department code defaults to the postal prefix.
    let department = req
        .department
        .unwrap_or_else(|| req.postal_code.chars().take(2).collect());

    Ok(ListingDraft {
        title: req.title,
        description: req.description,
        property_type,
        price_cents: req.price_cents,
        surface_m2: req.surface_m2,
        rooms: req.rooms,
        renovation_score: req.renovation_score,
        annual_energy_cost: req.annual_energy_cost,
        dpe_class,
        ges_class,
        in_coproperty: req.in_coproperty,
        city: req.city,
        postal_code: req.postal_code,
        department,
        point,
        approximate_location: req.approximate_location,
        agency_id: req.agency_id.map(AgencyId::from_uuid),
    })
}

fn parse_class(raw: Option<&str>, field: &str) -> Result<Option<EnergyClass>, MarketError> {
    raw.map(|s| {
        EnergyClass::parse(s)
            .ok_or_else(|| MarketError::Validation(format!("invalid {field}: {s}")))
    })
    .transpose()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn base_request() -> SubmitListingRequest {
        SubmitListingRequest {
            title: "Loft en duplex".to_string(),
            description: String::new(),
            property_type: "apartment".to_string(),
            price_cents: 42_000_000,
            surface_m2: 90.0,
            rooms: Some(4),
            renovation_score: None,
            annual_energy_cost: None,
            dpe_class: Some("B".to_string()),
            ges_class: None,
            in_coproperty: false,
            city: "Lille".to_string(),
            postal_code: "59000".to_string(),
            department: None,
            lat: None,
            lon: None,
            approximate_location: false,
            agency_id: None,
        }
    }

    #[test]
    fn department_defaults_to_postal_prefix() {
        let Ok(draft) = parse_draft(base_request()) else {
            panic!("parse failed");
        };
        assert_eq!(draft.department, "59");
        assert_eq!(draft.dpe_class, Some(EnergyClass::B));
    }

    #[test]
    fn lone_latitude_is_rejected() {
        let mut req = base_request();
        req.lat = Some(50.63);
        assert!(parse_draft(req).is_err());
    }

    #[test]
    fn unknown_property_type_is_rejected() {
        let mut req = base_request();
        req.property_type = "chateau".to_string();
        assert!(parse_draft(req).is_err());
    }
}
