//! Map viewport handler.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{MapParams, MapResponse};
use crate::app_state::AppState;
use crate::domain::BoundingBox;
use crate::error::{ErrorResponse, MarketError};
use crate::persistence::ListingQuery;
use crate::service::map::MapRequest;

/// `GET /listings/map` — Clustered viewport markers.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] for a malformed bounding box or
/// out-of-range zoom.
#[utoipa::path(
    get,
    path = "/api/v1/listings/map",
    tag = "Listings",
    summary = "Map viewport query",
    description = "Bins the viewport's listings into a zoom-dependent grid: dense cells become \
                   clusters, lone points individual markers. Approximate locations are \
                   obfuscated before leaving the server.",
    params(MapParams),
    responses(
        (status = 200, description = "Clusters and markers", body = serde_json::Value),
        (status = 400, description = "Invalid viewport", body = ErrorResponse),
    )
)]
pub async fn map_listings(
    State(state): State<AppState>,
    Query(params): Query<MapParams>,
) -> Result<impl IntoResponse, MarketError> {
    let filters = ListingQuery {
        property_types: super::search::parse_property_types(params.types.as_deref())?,
        price_min: params.price_min,
        price_max: params.price_max,
        ..ListingQuery::default()
    };
    let request = MapRequest {
        bbox: BoundingBox::new(params.west, params.south, params.east, params.north),
        zoom: params.zoom,
        filters,
    };

    let view = state.map.viewport(&request).await?;
    Ok(Json(MapResponse::from(view)))
}

/// Map routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/listings/map", get(map_listings))
}
