//! Listing search handler.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{ListingItemDto, PaginationMeta, SearchParams, SearchResponse};
use crate::app_state::AppState;
use crate::domain::ranking::{SortKey, SortOrder};
use crate::domain::{EnergyClass, GeoPoint, PropertyType};
use crate::error::{ErrorResponse, MarketError};
use crate::persistence::ListingQuery;
use crate::service::search::{RadiusFilter, SearchRequest};

/// `GET /listings/search` — Ordered, paginated listing search.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] for unknown enum values or an
/// incomplete radius triple.
#[utoipa::path(
    get,
    path = "/api/v1/listings/search",
    tag = "Listings",
    summary = "Search listings",
    description = "Returns an ordered, paginated listing page. Sponsored listings always rank \
                   ahead of organic ones; ties follow the requested sort key.",
    params(SearchParams),
    responses(
        (status = 200, description = "Ordered result page", body = serde_json::Value),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
    )
)]
pub async fn search_listings(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, MarketError> {
    let request = parse_search_request(&params)?;
    let page = state.search.search(&request).await?;

    let now = Utc::now();
    let data: Vec<ListingItemDto> = page
        .items
        .iter()
        .map(|item| ListingItemDto::from_item(item, now))
        .collect();

    Ok(Json(SearchResponse {
        data,
        pagination: PaginationMeta {
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            total_pages: page.total_pages,
        },
    }))
}

/// Search routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/listings/search", get(search_listings))
}

// ── Parameter Parsing Helpers ───────────────────────────────────────────

fn parse_search_request(params: &SearchParams) -> Result<SearchRequest, MarketError> {
    let query = ListingQuery {
        text: params.q.clone().filter(|s| !s.trim().is_empty()),
        city: params.city.clone(),
        postal_code: params.postal_code.clone(),
        property_types: parse_property_types(params.types.as_deref())?,
        price_min: params.price_min,
        price_max: params.price_max,
        surface_min: params.surface_min,
        surface_max: params.surface_max,
        rooms_min: params.rooms_min,
        renovation_min: params.renovation_min,
        energy_cost_max: params.energy_cost_max,
        dpe_max: parse_energy_class(params.dpe_max.as_deref(), "dpe_max")?,
        ges_max: parse_energy_class(params.ges_max.as_deref(), "ges_max")?,
        in_coproperty: params.in_coproperty,
        bbox: None,
        limit: None,
    };

    let sort_key = match params.sort_by.as_deref() {
        None => SortKey::default(),
        Some(raw) => SortKey::parse(raw)
            .ok_or_else(|| MarketError::Validation(format!("unknown sort key: {raw}")))?,
    };
    let sort_order = match params.order.as_deref() {
        None => SortOrder::default(),
        Some("asc") => SortOrder::Asc,
        Some("desc") => SortOrder::Desc,
        Some(raw) => {
            return Err(MarketError::Validation(format!(
                "order must be asc or desc, got {raw}"
            )));
        }
    };

    let radius = match (params.lat, params.lon, params.radius_km) {
        (None, None, None) => None,
        (Some(lat), Some(lon), Some(radius_km)) => Some(RadiusFilter {
            center: GeoPoint::new(lat, lon),
            radius_km,
        }),
        _ => {
            return Err(MarketError::Validation(
                "radius search requires lat, lon and radius_km together".to_string(),
            ));
        }
    };

    Ok(SearchRequest {
        query,
        sort_key,
        sort_order,
        radius,
        page: params.page.unwrap_or(1).max(1),
        per_page: params.per_page.unwrap_or(20).clamp(1, 100),
    })
}

/// Parses a comma-separated property type list.
pub(crate) fn parse_property_types(raw: Option<&str>) -> Result<Vec<PropertyType>, MarketError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            PropertyType::parse(s)
                .ok_or_else(|| MarketError::Validation(format!("unknown property type: {s}")))
        })
        .collect()
}

fn parse_energy_class(
    raw: Option<&str>,
    field: &str,
) -> Result<Option<EnergyClass>, MarketError> {
    raw.map(|s| {
        EnergyClass::parse(s)
            .ok_or_else(|| MarketError::Validation(format!("invalid {field} class: {s}")))
    })
    .transpose()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn property_type_list_parses() {
        let Ok(types) = parse_property_types(Some("apartment, house")) else {
            panic!("parse failed");
        };
        assert_eq!(types, vec![PropertyType::Apartment, PropertyType::House]);
        assert!(parse_property_types(Some("castle")).is_err());
        let Ok(empty) = parse_property_types(None) else {
            panic!("parse failed");
        };
        assert!(empty.is_empty());
    }

    #[test]
    fn incomplete_radius_triple_is_rejected() {
        let params = SearchParams {
            lat: Some(48.85),
            ..SearchParams::default()
        };
        assert!(parse_search_request(&params).is_err());
    }

    #[test]
    fn defaults_apply() {
        let Ok(request) = parse_search_request(&SearchParams::default()) else {
            panic!("parse failed");
        };
        assert_eq!(request.sort_key, SortKey::PublishedAt);
        assert_eq!(request.sort_order, SortOrder::Desc);
        assert_eq!(request.page, 1);
        assert_eq!(request.per_page, 20);
    }
}
