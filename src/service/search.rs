//! Search service: candidate fetch, agency enrichment, ranking, and
//! pagination.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::ranking::{self, RankedListing, SortKey, SortOrder};
use crate::domain::{GeoPoint, PackTier, pack};
use crate::error::MarketError;
use crate::persistence::{ListingQuery, MarketStore};

/// Radius restriction around a center point.
#[derive(Debug, Clone, Copy)]
pub struct RadiusFilter {
    /// Query center.
    pub center: GeoPoint,
    /// Inclusive radius in kilometers.
    pub radius_km: f64,
}

/// A fully described search request, as assembled by the handler.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Store-level filters.
    pub query: ListingQuery,
    /// Primary sort key.
    pub sort_key: SortKey,
    /// Primary sort direction.
    pub sort_order: SortOrder,
    /// Optional radius restriction; overrides the sort key ordering
    /// with priority-then-distance.
    pub radius: Option<RadiusFilter>,
    /// 1-indexed page number.
    pub page: u32,
    /// Page size.
    pub per_page: u32,
}

/// One result row with its monetization annotations.
#[derive(Debug, Clone)]
pub struct SearchItem {
    /// The ranked candidate.
    pub ranked: RankedListing,
    /// Whether the listing belongs to a known agency.
    pub agency_badge: bool,
    /// The owning agency's pack tier.
    pub agency_pack: Option<PackTier>,
    /// Whether the owning agency's pack highlights map markers.
    pub map_highlight: bool,
}

/// An ordered, paginated result page.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// The page rows, in final order.
    pub items: Vec<SearchItem>,
    /// 1-indexed page number.
    pub page: u32,
    /// Page size.
    pub per_page: u32,
    /// Total matching candidates before pagination.
    pub total: u32,
    /// Total page count.
    pub total_pages: u32,
}

/// Read-only orchestrator for listing search.
#[derive(Debug)]
pub struct SearchService {
    store: Arc<dyn MarketStore>,
    candidate_limit: usize,
}

impl SearchService {
    /// Creates a new `SearchService`. `candidate_limit` caps the
    /// candidate fetch when the request sets no limit of its own.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>, candidate_limit: usize) -> Self {
        Self {
            store,
            candidate_limit,
        }
    }

    /// Executes a search: fetch, enrich, order, then paginate.
    ///
    /// Pagination is applied only after the full ordering is
    /// established, so identical requests always see identical pages.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] for an ill-formed radius,
    /// [`MarketError::Persistence`] on store failure.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchPage, MarketError> {
        if let Some(radius) = &request.radius {
            validate_radius(radius)?;
        }

        let now = Utc::now();
        let mut query = request.query.clone();
        if query.limit.is_none() {
            query.limit = Some(self.candidate_limit);
        }
        let listings = self.store.search_listings(&query).await?;
        let agencies = super::fetch_owners(self.store.as_ref(), &listings).await?;

        let mut candidates: Vec<RankedListing> = listings
            .into_iter()
            .map(|listing| {
                let agency = listing.agency_id.and_then(|id| agencies.get(&id));
                let priority = ranking::effective_priority(&listing, agency, now);
                RankedListing {
                    listing,
                    priority,
                    distance_km: None,
                }
            })
            .collect();

        let candidates = if let Some(radius) = &request.radius {
            ranking::restrict_to_radius(candidates, radius.center, radius.radius_km)
        } else {
            ranking::sort_candidates(&mut candidates, request.sort_key, request.sort_order);
            candidates
        };

        let total = u32::try_from(candidates.len()).unwrap_or(u32::MAX);
        let per_page = request.per_page.max(1);
        let page = request.page.max(1);
        let total_pages = if total == 0 { 0 } else { total.div_ceil(per_page) };

        let start = ((page - 1) * per_page) as usize;
        let items: Vec<SearchItem> = candidates
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .map(|ranked| {
                let agency = ranked.listing.agency_id.and_then(|id| agencies.get(&id));
                let agency_pack = agency.map(|a| a.subscription.pack);
                SearchItem {
                    agency_badge: agency.is_some(),
                    map_highlight: agency_pack
                        .is_some_and(|tier| pack::config_for(tier).map_highlight),
                    agency_pack,
                    ranked,
                }
            })
            .collect();

        Ok(SearchPage {
            items,
            page,
            per_page,
            total,
            total_pages,
        })
    }
}

fn validate_radius(radius: &RadiusFilter) -> Result<(), MarketError> {
    if !(radius.radius_km.is_finite() && radius.radius_km > 0.0) {
        return Err(MarketError::Validation(format!(
            "radius must be a positive number of kilometers, got {}",
            radius.radius_km
        )));
    }
    let GeoPoint { lat, lon } = radius.center;
    if !((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)) {
        return Err(MarketError::Validation(format!(
            "radius center out of range: ({lat}, {lon})"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::{Agency, AgencyId, Listing, ListingId, ListingStatus, PropertyType};
    use crate::persistence::memory::MemoryStore;

    fn make_listing(
        price: i64,
        agency_id: Option<AgencyId>,
        point: Option<GeoPoint>,
    ) -> Listing {
        Listing {
            id: ListingId::new(),
            title: "Appartement centre-ville".to_string(),
            description: String::new(),
            property_type: PropertyType::Apartment,
            status: ListingStatus::Active,
            price_cents: price,
            surface_m2: 55.0,
            rooms: Some(2),
            renovation_score: Some(5),
            annual_energy_cost: None,
            dpe_class: None,
            ges_class: None,
            in_coproperty: false,
            city: "Paris".to_string(),
            postal_code: "75010".to_string(),
            department: "75".to_string(),
            point,
            approximate_location: false,
            agency_id,
            published_at: Utc::now(),
            is_sponsored: false,
            sponsored_at: None,
            sponsored_until: None,
            auto_boost_applied: false,
            auto_boost_recurrent: false,
        }
    }

    async fn seed_agency(store: &MemoryStore, pack: PackTier, balance: i64) -> AgencyId {
        let mut agency = Agency::new("Agence Test", 50);
        agency.subscription.pack = pack;
        agency.cpc.balance_cents = balance;
        let id = agency.id;
        let Ok(()) = store.insert_agency(&agency).await else {
            panic!("insert failed");
        };
        id
    }

    fn default_request() -> SearchRequest {
        SearchRequest {
            query: ListingQuery::default(),
            sort_key: SortKey::Price,
            sort_order: SortOrder::Asc,
            radius: None,
            page: 1,
            per_page: 20,
        }
    }

    #[tokio::test]
    async fn sponsored_listing_tops_the_page() {
        let store = Arc::new(MemoryStore::new());
        let premium = seed_agency(&store, PackTier::Premium, 10_000).await;

        let cheap = make_listing(100_000, None, None);
        let mut boosted = make_listing(900_000, Some(premium), None);
        let now = Utc::now();
        boosted.is_sponsored = true;
        boosted.sponsored_at = Some(now - Duration::hours(1));
        boosted.sponsored_until = Some(now + Duration::hours(1));

        for listing in [&cheap, &boosted] {
            let Ok(()) = store.insert_listing(listing).await else {
                panic!("insert failed");
            };
        }

        let service = SearchService::new(Arc::clone(&store) as Arc<dyn MarketStore>, 5_000);
        let Ok(page) = service.search(&default_request()).await else {
            panic!("search failed");
        };

        assert_eq!(page.total, 2);
        let Some(first) = page.items.first() else {
            panic!("expected items");
        };
        // Most expensive listing first despite ascending price sort:
        // sponsorship dominates.
        assert_eq!(first.ranked.listing.price_cents, 900_000);
        assert!(first.agency_badge);
        assert_eq!(first.agency_pack, Some(PackTier::Premium));
        assert!(first.map_highlight);
    }

    #[tokio::test]
    async fn pagination_happens_after_full_ordering() {
        let store = Arc::new(MemoryStore::new());
        for price in [500, 100, 400, 200, 300] {
            let Ok(()) = store.insert_listing(&make_listing(price, None, None)).await else {
                panic!("insert failed");
            };
        }
        let service = SearchService::new(Arc::clone(&store) as Arc<dyn MarketStore>, 5_000);

        let mut request = default_request();
        request.per_page = 2;
        request.page = 2;
        let Ok(page) = service.search(&request).await else {
            panic!("search failed");
        };

        let prices: Vec<i64> = page.items.iter().map(|i| i.ranked.listing.price_cents).collect();
        assert_eq!(prices, vec![300, 400]);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn radius_search_filters_and_orders_by_distance() {
        let store = Arc::new(MemoryStore::new());
        let paris = GeoPoint::new(48.8566, 2.3522);

        let near = make_listing(100, None, Some(GeoPoint::new(48.90, 2.35)));
        let far = make_listing(100, None, Some(GeoPoint::new(48.95, 2.35)));
        let very_near = make_listing(100, None, Some(GeoPoint::new(48.86, 2.3522)));
        for listing in [&near, &far, &very_near] {
            let Ok(()) = store.insert_listing(listing).await else {
                panic!("insert failed");
            };
        }

        let service = SearchService::new(Arc::clone(&store) as Arc<dyn MarketStore>, 5_000);
        let mut request = default_request();
        request.radius = Some(RadiusFilter {
            center: paris,
            radius_km: 10.0,
        });
        let Ok(page) = service.search(&request).await else {
            panic!("search failed");
        };

        assert_eq!(page.total, 2);
        let ids: Vec<ListingId> = page.items.iter().map(|i| i.ranked.listing.id).collect();
        assert_eq!(ids, vec![very_near.id, near.id]);
    }

    #[tokio::test]
    async fn invalid_radius_is_rejected_before_store_access() {
        let store = Arc::new(MemoryStore::new());
        let service = SearchService::new(Arc::clone(&store) as Arc<dyn MarketStore>, 5_000);
        let mut request = default_request();
        request.radius = Some(RadiusFilter {
            center: GeoPoint::new(48.85, 2.35),
            radius_km: -1.0,
        });
        let result = service.search(&request).await;
        assert!(matches!(result, Err(MarketError::Validation(_))));
    }

    #[tokio::test]
    async fn higher_pack_outranks_lower_all_else_equal() {
        let store = Arc::new(MemoryStore::new());
        let free = seed_agency(&store, PackTier::Free, 0).await;
        let pro = seed_agency(&store, PackTier::Pro, 0).await;

        let on_free = make_listing(100, Some(free), None);
        let on_pro = make_listing(100, Some(pro), None);
        for listing in [&on_free, &on_pro] {
            let Ok(()) = store.insert_listing(listing).await else {
                panic!("insert failed");
            };
        }

        let service = SearchService::new(Arc::clone(&store) as Arc<dyn MarketStore>, 5_000);
        let Ok(page) = service.search(&default_request()).await else {
            panic!("search failed");
        };
        let Some(first) = page.items.first() else {
            panic!("expected items");
        };
        assert_eq!(first.agency_pack, Some(PackTier::Pro));
    }
}
