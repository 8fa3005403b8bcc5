//! Search endpoint DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use super::common_dto::PaginationMeta;
use crate::domain::{GeoPoint, ListingId};
use crate::service::search::SearchItem;

/// Query parameters for `GET /listings/search`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Free-text query over title and description.
    pub q: Option<String>,
    /// City filter (case-insensitive).
    pub city: Option<String>,
    /// Postal-code filter.
    pub postal_code: Option<String>,
    /// Comma-separated property types (e.g. `"apartment,house"`).
    pub types: Option<String>,
    /// Minimum price in euro cents.
    pub price_min: Option<i64>,
    /// Maximum price in euro cents.
    pub price_max: Option<i64>,
    /// Minimum surface in m².
    pub surface_min: Option<f64>,
    /// Maximum surface in m².
    pub surface_max: Option<f64>,
    /// Minimum room count.
    pub rooms_min: Option<u8>,
    /// Minimum renovation score.
    pub renovation_min: Option<u8>,
    /// Maximum annual energy cost in euros.
    pub energy_cost_max: Option<i32>,
    /// Worst acceptable DPE class letter.
    pub dpe_max: Option<String>,
    /// Worst acceptable GES class letter.
    pub ges_max: Option<String>,
    /// Coproperty membership filter.
    pub in_coproperty: Option<bool>,
    /// Primary sort key: `price`, `surface`, `renovation`, or
    /// `published_at` (default).
    pub sort_by: Option<String>,
    /// Sort direction: `asc` or `desc` (default).
    pub order: Option<String>,
    /// Radius-search center latitude.
    pub lat: Option<f64>,
    /// Radius-search center longitude.
    pub lon: Option<f64>,
    /// Radius in kilometers; requires `lat` and `lon`.
    pub radius_km: Option<f64>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Items per page (max 100).
    pub per_page: Option<u32>,
}

/// One listing row in a search response.
#[derive(Debug, Clone, Serialize)]
pub struct ListingItemDto {
    /// Listing identifier.
    pub id: ListingId,
    /// Ad title.
    pub title: String,
    /// Property type string.
    pub property_type: String,
    /// Price in euro cents.
    pub price_cents: i64,
    /// Surface in m².
    pub surface_m2: f64,
    /// Room count.
    pub rooms: Option<u8>,
    /// Renovation score.
    pub renovation_score: Option<u8>,
    /// DPE class letter.
    pub dpe_class: Option<String>,
    /// GES class letter.
    pub ges_class: Option<String>,
    /// City name.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// Safe-to-expose coordinate (obfuscated for approximate
    /// locations).
    pub point: Option<GeoPoint>,
    /// Submission timestamp.
    pub published_at: DateTime<Utc>,
    /// Whether the listing is currently sponsored.
    pub sponsored: bool,
    /// Distance from the radius center, km (radius searches only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    /// Whether the listing belongs to a known agency.
    pub agency_badge: bool,
    /// The owning agency's pack tier string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agency_pack: Option<String>,
    /// Whether the owning agency's pack highlights map markers.
    pub map_highlight: bool,
}

impl ListingItemDto {
    /// Builds the wire row from a ranked search item.
    #[must_use]
    pub fn from_item(item: &SearchItem, now: DateTime<Utc>) -> Self {
        let listing = &item.ranked.listing;
        Self {
            id: listing.id,
            title: listing.title.clone(),
            property_type: listing.property_type.as_str().to_string(),
            price_cents: listing.price_cents,
            surface_m2: listing.surface_m2,
            rooms: listing.rooms,
            renovation_score: listing.renovation_score,
            dpe_class: listing.dpe_class.map(|c| c.as_str().to_string()),
            ges_class: listing.ges_class.map(|c| c.as_str().to_string()),
            city: listing.city.clone(),
            postal_code: listing.postal_code.clone(),
            point: listing.display_point(),
            published_at: listing.published_at,
            sponsored: listing.is_currently_sponsored(now),
            distance_km: item.ranked.distance_km,
            agency_badge: item.agency_badge,
            agency_pack: item.agency_pack.map(|t| t.as_str().to_string()),
            map_highlight: item.map_highlight,
        }
    }
}

/// Paginated response for `GET /listings/search`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Ordered page rows.
    pub data: Vec<ListingItemDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
