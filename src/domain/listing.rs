//! Listing entity: a real-estate ad with location, pricing and
//! sponsorship fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::GeoPoint;
use super::ids::{AgencyId, ListingId};

/// Property category discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    /// Apartment / flat.
    Apartment,
    /// Detached or semi-detached house.
    House,
    /// Building land.
    Land,
    /// Shops, offices, warehouses.
    Commercial,
    /// Parking spot or garage.
    Parking,
}

impl PropertyType {
    /// Parses a stored type string; unknown values yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "apartment" => Some(Self::Apartment),
            "house" => Some(Self::House),
            "land" => Some(Self::Land),
            "commercial" => Some(Self::Commercial),
            "parking" => Some(Self::Parking),
            _ => None,
        }
    }

    /// Stable string form used in storage and API payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Apartment => "apartment",
            Self::House => "house",
            Self::Land => "land",
            Self::Commercial => "commercial",
            Self::Parking => "parking",
        }
    }
}

/// Listing lifecycle status. Only `Active` listings are searchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    /// Published and searchable.
    Active,
    /// Awaiting moderation.
    Pending,
    /// Withdrawn by the owner.
    Inactive,
    /// Transaction concluded.
    Sold,
}

impl ListingStatus {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Inactive => "inactive",
            Self::Sold => "sold",
        }
    }

    /// Parses a stored status string, defaulting to `Pending`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => Self::Active,
            "inactive" => Self::Inactive,
            "sold" => Self::Sold,
            _ => Self::Pending,
        }
    }
}

/// French energy-performance class (DPE/GES), A best to G worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnergyClass {
    /// Best rating.
    A,
    /// Rating B.
    B,
    /// Rating C.
    C,
    /// Rating D.
    D,
    /// Rating E.
    E,
    /// Rating F.
    F,
    /// Worst rating.
    G,
}

impl EnergyClass {
    /// Parses a one-letter class; unknown values yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "A" | "a" => Some(Self::A),
            "B" | "b" => Some(Self::B),
            "C" | "c" => Some(Self::C),
            "D" | "d" => Some(Self::D),
            "E" | "e" => Some(Self::E),
            "F" | "f" => Some(Self::F),
            "G" | "g" => Some(Self::G),
            _ => None,
        }
    }

    /// Stable one-letter form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
            Self::G => "G",
        }
    }
}

/// A real-estate ad.
///
/// Created at submission time, mutated by the auto-boost applier and by
/// status transitions; never deleted by the core. Sponsorship is carried
/// by the `[sponsored_at, sponsored_until]` window — see
/// [`Listing::is_currently_sponsored`] for the lazy-expiry rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Unique listing identifier (immutable after creation).
    pub id: ListingId,
    /// Ad title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Property category.
    pub property_type: PropertyType,
    /// Lifecycle status.
    pub status: ListingStatus,
    /// Asking price in euro cents.
    pub price_cents: i64,
    /// Habitable surface in square meters.
    pub surface_m2: f64,
    /// Number of rooms.
    pub rooms: Option<u8>,
    /// Renovation score, 0 (to renovate) to 10 (new build).
    pub renovation_score: Option<u8>,
    /// Estimated annual energy cost in euros.
    pub annual_energy_cost: Option<i32>,
    /// DPE energy class.
    pub dpe_class: Option<EnergyClass>,
    /// GES emissions class.
    pub ges_class: Option<EnergyClass>,
    /// Whether the property is part of a coproperty.
    pub in_coproperty: bool,
    /// City name.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// Department code (first two postal digits in metropolitan France).
    pub department: String,
    /// Geographic point, when geocoded.
    pub point: Option<GeoPoint>,
    /// Whether `point` is only approximate and must be obfuscated
    /// before leaving the core.
    pub approximate_location: bool,
    /// Owning agency; `None` for platform-sourced listings.
    pub agency_id: Option<AgencyId>,
    /// Submission timestamp (immutable after creation).
    pub published_at: DateTime<Utc>,
    /// Sponsorship flag; only meaningful inside the window.
    pub is_sponsored: bool,
    /// Sponsorship window start.
    pub sponsored_at: Option<DateTime<Utc>>,
    /// Sponsorship window end.
    pub sponsored_until: Option<DateTime<Utc>>,
    /// Whether the current window was granted by pack policy rather
    /// than purchased.
    pub auto_boost_applied: bool,
    /// Mirrors the pack's recurrence flag (informational).
    pub auto_boost_recurrent: bool,
}

impl Listing {
    /// Returns `true` when the listing is sponsored *right now*.
    ///
    /// A listing whose window has elapsed is treated as non-sponsored
    /// even if `is_sponsored` has not been cleared — no background job
    /// guarantees prompt flag flips.
    #[must_use]
    pub fn is_currently_sponsored(&self, now: DateTime<Utc>) -> bool {
        if !self.is_sponsored {
            return false;
        }
        match (self.sponsored_at, self.sponsored_until) {
            (Some(start), Some(end)) => now >= start && now <= end,
            _ => false,
        }
    }

    /// The coordinate safe to expose to callers: the true point for
    /// precise locations, the deterministically displaced one for
    /// approximate locations.
    #[must_use]
    pub fn display_point(&self) -> Option<GeoPoint> {
        let point = self.point?;
        if self.approximate_location {
            Some(point.obfuscated(self.id))
        } else {
            Some(point)
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn base_listing() -> Listing {
        Listing {
            id: ListingId::new(),
            title: "T3 lumineux".to_string(),
            description: "Proche métro".to_string(),
            property_type: PropertyType::Apartment,
            status: ListingStatus::Active,
            price_cents: 25_000_000,
            surface_m2: 62.0,
            rooms: Some(3),
            renovation_score: Some(7),
            annual_energy_cost: Some(900),
            dpe_class: Some(EnergyClass::C),
            ges_class: Some(EnergyClass::D),
            in_coproperty: true,
            city: "Lyon".to_string(),
            postal_code: "69003".to_string(),
            department: "69".to_string(),
            point: Some(GeoPoint::new(45.7578, 4.8320)),
            approximate_location: false,
            agency_id: None,
            published_at: Utc::now(),
            is_sponsored: false,
            sponsored_at: None,
            sponsored_until: None,
            auto_boost_applied: false,
            auto_boost_recurrent: false,
        }
    }

    #[test]
    fn sponsorship_respects_window() {
        let now = Utc::now();
        let mut listing = base_listing();
        listing.is_sponsored = true;
        listing.sponsored_at = Some(now - Duration::hours(1));
        listing.sponsored_until = Some(now + Duration::hours(1));
        assert!(listing.is_currently_sponsored(now));
    }

    #[test]
    fn elapsed_window_reads_as_unsponsored() {
        // Stale flag: the window ended but nothing cleared is_sponsored.
        let now = Utc::now();
        let mut listing = base_listing();
        listing.is_sponsored = true;
        listing.sponsored_at = Some(now - Duration::hours(50));
        listing.sponsored_until = Some(now - Duration::hours(2));
        assert!(!listing.is_currently_sponsored(now));
    }

    #[test]
    fn flag_without_window_reads_as_unsponsored() {
        let mut listing = base_listing();
        listing.is_sponsored = true;
        assert!(!listing.is_currently_sponsored(Utc::now()));
    }

    #[test]
    fn precise_location_is_passed_through() {
        let listing = base_listing();
        assert_eq!(listing.display_point(), listing.point);
    }

    #[test]
    fn approximate_location_is_displaced() {
        let mut listing = base_listing();
        listing.approximate_location = true;
        let Some(shown) = listing.display_point() else {
            panic!("expected a point");
        };
        let Some(real) = listing.point else {
            panic!("expected a point");
        };
        assert_ne!(shown, real);
        // Stable across calls.
        assert_eq!(listing.display_point(), Some(shown));
    }

    #[test]
    fn energy_class_parses_both_cases() {
        assert_eq!(EnergyClass::parse("a"), Some(EnergyClass::A));
        assert_eq!(EnergyClass::parse("G"), Some(EnergyClass::G));
        assert_eq!(EnergyClass::parse("H"), None);
    }
}
