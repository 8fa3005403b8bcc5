//! Ranking engine: the total order applied to search candidates.
//!
//! Sponsorship dominates everything (a boost of 100 against pack
//! priorities capped at 3), then the caller-requested sort key, then a
//! fixed tie-break so that result ordering is deterministic across
//! requests with identical primary keys.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::agency::Agency;
use super::geo::GeoPoint;
use super::listing::Listing;
use super::pack;

/// Score boost applied to a currently sponsored listing. Far above the
/// maximum pack priority so sponsorship always wins.
pub const SPONSORED_BOOST: u32 = 100;

/// Caller-selectable primary sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Asking price.
    Price,
    /// Habitable surface.
    Surface,
    /// Renovation score.
    Renovation,
    /// Submission date.
    #[default]
    PublishedAt,
}

impl SortKey {
    /// Parses a query-string key; unknown values yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "price" => Some(Self::Price),
            "surface" => Some(Self::Surface),
            "renovation" => Some(Self::Renovation),
            "published_at" | "date" => Some(Self::PublishedAt),
            _ => None,
        }
    }
}

/// Sort direction for the primary key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    #[default]
    Desc,
}

/// A candidate enriched with its computed priority and, in radius
/// mode, its distance from the query center.
#[derive(Debug, Clone)]
pub struct RankedListing {
    /// The underlying listing.
    pub listing: Listing,
    /// `SPONSORED_BOOST` when currently sponsored, plus the owning
    /// agency's pack priority (0 without an agency).
    pub priority: u32,
    /// Great-circle distance from the radius-search center, km.
    pub distance_km: Option<f64>,
}

/// Computes a listing's priority score.
///
/// `pack_priority` is the owning agency's display priority, or 0 when
/// the listing has no agency. Sponsorship is evaluated lazily against
/// `now` — an elapsed window counts as unsponsored.
#[must_use]
pub fn priority(listing: &Listing, pack_priority: u8, now: DateTime<Utc>) -> u32 {
    let boost = if listing.is_currently_sponsored(now) {
        SPONSORED_BOOST
    } else {
        0
    };
    boost + u32::from(pack_priority)
}

/// Computes a listing's priority against its owning agency's live
/// account state.
///
/// The sponsorship boost only counts when the click is fundable: an
/// agency whose balance no longer covers one discounted click has its
/// sponsorship-driven boost disabled at read time — the ledger itself
/// never flips any flag. Agency-less sponsored listings keep the boost.
#[must_use]
pub fn effective_priority(listing: &Listing, agency: Option<&Agency>, now: DateTime<Utc>) -> u32 {
    let pack_priority =
        agency.map_or(0, |a| pack::config_for(a.subscription.pack).display_priority);
    let funded = agency.is_none_or(|a| {
        a.cpc.balance_cents
            >= pack::effective_cpc_price(a.subscription.pack, a.cpc.cost_per_click_cents)
    });
    let boost = if funded && listing.is_currently_sponsored(now) {
        SPONSORED_BOOST
    } else {
        0
    };
    boost + u32::from(pack_priority)
}

/// Orders candidates in place: priority descending, then the requested
/// key, then the fixed tie-break.
pub fn sort_candidates(items: &mut [RankedListing], key: SortKey, order: SortOrder) {
    items.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| match order {
                SortOrder::Asc => compare_key(a, b, key),
                SortOrder::Desc => compare_key(b, a, key),
            })
            .then_with(|| {
                if key == SortKey::PublishedAt {
                    Ordering::Equal
                } else {
                    tie_break(a, b)
                }
            })
    });
}

/// Restricts candidates to the haversine disk around `center` and
/// orders them priority descending, then distance ascending.
///
/// Listings without coordinates are excluded — radius search only.
#[must_use]
pub fn restrict_to_radius(
    items: Vec<RankedListing>,
    center: GeoPoint,
    radius_km: f64,
) -> Vec<RankedListing> {
    let mut kept: Vec<RankedListing> = items
        .into_iter()
        .filter_map(|mut item| {
            let point = item.listing.display_point()?;
            let d = center.distance_km(&point);
            if d <= radius_km {
                item.distance_km = Some(d);
                Some(item)
            } else {
                None
            }
        })
        .collect();

    kept.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| {
                let da = a.distance_km.unwrap_or(f64::MAX);
                let db = b.distance_km.unwrap_or(f64::MAX);
                da.total_cmp(&db)
            })
            .then_with(|| tie_break(a, b))
    });
    kept
}

fn compare_key(a: &RankedListing, b: &RankedListing, key: SortKey) -> Ordering {
    match key {
        SortKey::Price => a.listing.price_cents.cmp(&b.listing.price_cents),
        SortKey::Surface => a.listing.surface_m2.total_cmp(&b.listing.surface_m2),
        SortKey::Renovation => a
            .listing
            .renovation_score
            .unwrap_or(0)
            .cmp(&b.listing.renovation_score.unwrap_or(0)),
        SortKey::PublishedAt => a.listing.published_at.cmp(&b.listing.published_at),
    }
}

// Fixed secondary tie-break: renovation score descending, then
// submission date descending.
fn tie_break(a: &RankedListing, b: &RankedListing) -> Ordering {
    b.listing
        .renovation_score
        .unwrap_or(0)
        .cmp(&a.listing.renovation_score.unwrap_or(0))
        .then_with(|| b.listing.published_at.cmp(&a.listing.published_at))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::ids::ListingId;
    use crate::domain::listing::{ListingStatus, PropertyType};

    fn make_listing(price: i64, renovation: Option<u8>) -> Listing {
        Listing {
            id: ListingId::new(),
            title: "test".to_string(),
            description: String::new(),
            property_type: PropertyType::Apartment,
            status: ListingStatus::Active,
            price_cents: price,
            surface_m2: 50.0,
            rooms: Some(2),
            renovation_score: renovation,
            annual_energy_cost: None,
            dpe_class: None,
            ges_class: None,
            in_coproperty: false,
            city: "Paris".to_string(),
            postal_code: "75011".to_string(),
            department: "75".to_string(),
            point: None,
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

    fn sponsor(listing: &mut Listing, now: DateTime<Utc>) {
        listing.is_sponsored = true;
        listing.sponsored_at = Some(now - Duration::hours(1));
        listing.sponsored_until = Some(now + Duration::hours(1));
    }

    fn ranked(listing: Listing, pack_priority: u8, now: DateTime<Utc>) -> RankedListing {
        let p = priority(&listing, pack_priority, now);
        RankedListing {
            listing,
            priority: p,
            distance_km: None,
        }
    }

    #[test]
    fn sponsored_beats_any_pack_tier() {
        let now = Utc::now();
        let mut cheap_sponsored = make_listing(100, None);
        sponsor(&mut cheap_sponsored, now);
        let premium_organic = make_listing(50, None);

        // Sponsored listing owned by nobody vs organic premium agency.
        let mut items = vec![
            ranked(premium_organic, 3, now),
            ranked(cheap_sponsored, 0, now),
        ];
        sort_candidates(&mut items, SortKey::Price, SortOrder::Asc);

        let Some(first) = items.first() else {
            panic!("expected items");
        };
        assert!(first.listing.is_currently_sponsored(now));
        assert_eq!(first.priority, SPONSORED_BOOST);
    }

    #[test]
    fn pack_priority_orders_organic_results() {
        let now = Utc::now();
        let mut items = vec![
            ranked(make_listing(100, None), 0, now),
            ranked(make_listing(100, None), 3, now),
            ranked(make_listing(100, None), 1, now),
        ];
        sort_candidates(&mut items, SortKey::Price, SortOrder::Asc);
        let priorities: Vec<u32> = items.iter().map(|i| i.priority).collect();
        assert_eq!(priorities, vec![3, 1, 0]);
    }

    #[test]
    fn expired_sponsorship_loses_the_boost() {
        let now = Utc::now();
        let mut stale = make_listing(100, None);
        stale.is_sponsored = true;
        stale.sponsored_at = Some(now - Duration::hours(72));
        stale.sponsored_until = Some(now - Duration::hours(24));
        assert_eq!(priority(&stale, 2, now), 2);
    }

    #[test]
    fn requested_key_orders_within_equal_priority() {
        let now = Utc::now();
        let mut items = vec![
            ranked(make_listing(300, None), 1, now),
            ranked(make_listing(100, None), 1, now),
            ranked(make_listing(200, None), 1, now),
        ];
        sort_candidates(&mut items, SortKey::Price, SortOrder::Asc);
        let prices: Vec<i64> = items.iter().map(|i| i.listing.price_cents).collect();
        assert_eq!(prices, vec![100, 200, 300]);

        sort_candidates(&mut items, SortKey::Price, SortOrder::Desc);
        let prices: Vec<i64> = items.iter().map(|i| i.listing.price_cents).collect();
        assert_eq!(prices, vec![300, 200, 100]);
    }

    #[test]
    fn tie_break_prefers_better_renovation() {
        let now = Utc::now();
        let mut items = vec![
            ranked(make_listing(100, Some(2)), 0, now),
            ranked(make_listing(100, Some(9)), 0, now),
        ];
        sort_candidates(&mut items, SortKey::Price, SortOrder::Asc);
        let scores: Vec<Option<u8>> = items
            .iter()
            .map(|i| i.listing.renovation_score)
            .collect();
        assert_eq!(scores, vec![Some(9), Some(2)]);
    }

    #[test]
    fn radius_excludes_far_and_coordinate_less_listings() {
        let now = Utc::now();
        let center = GeoPoint::new(48.8566, 2.3522);

        let mut near = make_listing(100, None);
        near.point = Some(GeoPoint::new(48.90, 2.35)); // ~4.9 km
        let mut far = make_listing(100, None);
        far.point = Some(GeoPoint::new(48.95, 2.35)); // ~10.4 km
        let no_coords = make_listing(100, None);

        let items = vec![
            ranked(near, 0, now),
            ranked(far, 0, now),
            ranked(no_coords, 0, now),
        ];
        let kept = restrict_to_radius(items, center, 10.0);
        assert_eq!(kept.len(), 1);
        let Some(only) = kept.first() else {
            panic!("expected one result");
        };
        let Some(d) = only.distance_km else {
            panic!("expected a distance");
        };
        assert!(d < 10.0);
    }

    #[test]
    fn radius_orders_by_priority_then_distance() {
        let now = Utc::now();
        let center = GeoPoint::new(48.8566, 2.3522);

        let mut close = make_listing(100, None);
        close.point = Some(GeoPoint::new(48.86, 2.3522));
        let mut farther_sponsored = make_listing(100, None);
        farther_sponsored.point = Some(GeoPoint::new(48.90, 2.3522));
        sponsor(&mut farther_sponsored, now);

        let items = vec![ranked(close, 0, now), ranked(farther_sponsored, 0, now)];
        let kept = restrict_to_radius(items, center, 10.0);

        // Sponsorship dominates distance.
        let Some(first) = kept.first() else {
            panic!("expected results");
        };
        assert!(first.listing.is_currently_sponsored(now));
    }

    #[test]
    fn unfunded_agency_loses_sponsorship_boost() {
        use crate::domain::agency::Agency;
        use crate::domain::pack::PackTier;

        let now = Utc::now();
        let mut listing = make_listing(100, None);
        sponsor(&mut listing, now);

        let mut agency = Agency::new("Agence Centrale", 50);
        agency.subscription.pack = PackTier::Pro;
        agency.cpc.balance_cents = 1_000;
        assert_eq!(effective_priority(&listing, Some(&agency), now), 102);

        // Balance below one discounted click: boost disabled at read
        // time, pack priority kept.
        agency.cpc.balance_cents = 10;
        assert_eq!(effective_priority(&listing, Some(&agency), now), 2);

        // Agency-less sponsored listings keep the boost.
        assert_eq!(effective_priority(&listing, None, now), SPONSORED_BOOST);
    }
}
