//! Listing submission and click DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ListingId;

/// Request body for `POST /listings`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitListingRequest {
    /// Ad title.
    pub title: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Property type string (`apartment`, `house`, ...).
    pub property_type: String,
    /// Asking price in euro cents.
    pub price_cents: i64,
    /// Habitable surface in m².
    pub surface_m2: f64,
    /// Number of rooms.
    #[serde(default)]
    pub rooms: Option<u8>,
    /// Renovation score, 0–10.
    #[serde(default)]
    pub renovation_score: Option<u8>,
    /// Annual energy cost in euros.
    #[serde(default)]
    pub annual_energy_cost: Option<i32>,
    /// DPE class letter.
    #[serde(default)]
    pub dpe_class: Option<String>,
    /// GES class letter.
    #[serde(default)]
    pub ges_class: Option<String>,
    /// Coproperty membership.
    #[serde(default)]
    pub in_coproperty: bool,
    /// City name.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// Department code; derived from the postal code when absent.
    #[serde(default)]
    pub department: Option<String>,
    /// Latitude, when geocoded.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude, when geocoded.
    #[serde(default)]
    pub lon: Option<f64>,
    /// Whether the coordinate is only approximate.
    #[serde(default)]
    pub approximate_location: bool,
    /// Owning agency id; omit for platform-sourced listings.
    #[serde(default)]
    pub agency_id: Option<uuid::Uuid>,
}

/// Response body for `POST /listings` (201 Created).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmitListingResponse {
    /// The new listing's identifier.
    pub listing_id: ListingId,
    /// Lifecycle status string.
    pub status: String,
    /// Whether an auto-boost window was granted.
    pub is_sponsored: bool,
    /// Sponsorship window end, when granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsored_until: Option<DateTime<Utc>>,
    /// Server creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Response body for `POST /listings/{id}/click`.
///
/// Insufficient funds still answers 200 with `billed: false` — a
/// declined debit never fails the visitor's page view.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClickResponse {
    /// Whether a debit was applied.
    pub billed: bool,
    /// The discounted click price, when a billable context existed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
}
