//! Map service: viewport queries, zoom-dependent clustering, and
//! positional obfuscation.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::clustering::{self, DETAIL_ZOOM};
use crate::domain::ranking::{self, RankedListing};
use crate::domain::{BoundingBox, GeoPoint, ListingId, PropertyType, pack};
use crate::error::MarketError;
use crate::persistence::{ListingQuery, MarketStore};

/// Highest zoom level accepted from clients.
const MAX_ZOOM: u8 = 22;

/// A viewport query, as assembled by the handler.
#[derive(Debug, Clone)]
pub struct MapRequest {
    /// Viewport rectangle.
    pub bbox: BoundingBox,
    /// Tile zoom level.
    pub zoom: u8,
    /// Additional store-level filters; `bbox` and `limit` are set by
    /// the service.
    pub filters: ListingQuery,
}

/// An aggregated marker.
#[derive(Debug, Clone)]
pub struct ClusterView {
    /// Number of member listings.
    pub count: usize,
    /// Arithmetic mean of member coordinates.
    pub center: GeoPoint,
    /// Member bounding rectangle.
    pub bbox: BoundingBox,
}

/// An individual marker.
#[derive(Debug, Clone)]
pub struct PointView {
    /// Listing identifier.
    pub id: ListingId,
    /// Safe-to-expose coordinate (already obfuscated when the listing
    /// location is approximate).
    pub point: GeoPoint,
    /// Asking price in cents.
    pub price_cents: i64,
    /// Property category.
    pub property_type: PropertyType,
    /// Whether the listing is currently sponsored.
    pub sponsored: bool,
    /// Whether the owning agency's pack highlights the marker.
    pub highlighted: bool,
}

/// The clustered viewport response.
#[derive(Debug, Clone)]
pub struct MapView {
    /// Dense-cell aggregates.
    pub clusters: Vec<ClusterView>,
    /// Individual markers (singletons; plus cluster members at very
    /// high zoom).
    pub points: Vec<PointView>,
    /// Echo of the requested viewport.
    pub bbox: BoundingBox,
    /// Echo of the requested zoom.
    pub zoom: u8,
}

/// Read-only orchestrator for map viewport queries.
#[derive(Debug)]
pub struct MapService {
    store: Arc<dyn MarketStore>,
}

impl MapService {
    /// Creates a new `MapService`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Executes a viewport query.
    ///
    /// The candidate pool is capped inversely to zoom and pre-sorted
    /// sponsored-first at the store, so truncation never starves paid
    /// listings. Approximate locations are displaced before clustering
    /// — the true coordinate never reaches the caller.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] for an ill-formed viewport,
    /// [`MarketError::Persistence`] on store failure.
    pub async fn viewport(&self, request: &MapRequest) -> Result<MapView, MarketError> {
        if !request.bbox.is_valid() {
            return Err(MarketError::Validation(
                "invalid bounding box: west must be less than east and south less than north"
                    .to_string(),
            ));
        }
        if request.zoom > MAX_ZOOM {
            return Err(MarketError::Validation(format!(
                "zoom must be at most {MAX_ZOOM}, got {}",
                request.zoom
            )));
        }

        let now = Utc::now();
        let mut query = request.filters.clone();
        query.bbox = Some(request.bbox);
        query.limit = Some(clustering::candidate_cap(request.zoom));

        let listings = self.store.search_listings(&query).await?;
        let agencies = super::fetch_owners(self.store.as_ref(), &listings).await?;

        // Enrich and keep only listings with an exposable coordinate.
        let mut candidates: Vec<(RankedListing, GeoPoint, bool)> = listings
            .into_iter()
            .filter_map(|listing| {
                let shown = listing.display_point()?;
                let agency = listing.agency_id.and_then(|id| agencies.get(&id));
                let priority = ranking::effective_priority(&listing, agency, now);
                let highlighted = agency
                    .is_some_and(|a| pack::config_for(a.subscription.pack).map_highlight);
                Some((
                    RankedListing {
                        listing,
                        priority,
                        distance_km: None,
                    },
                    shown,
                    highlighted,
                ))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.priority.cmp(&a.0.priority));

        let coords: Vec<GeoPoint> = candidates.iter().map(|(_, p, _)| *p).collect();
        let grid = clustering::cluster_points(&coords, request.zoom);

        let clusters: Vec<ClusterView> = grid
            .clusters
            .iter()
            .map(|c| ClusterView {
                count: c.count,
                center: c.center,
                bbox: c.bbox,
            })
            .collect();

        let mut point_indices = grid.singletons;
        if request.zoom >= DETAIL_ZOOM {
            // Individual precision matters to the renderer here: emit
            // cluster members alongside the cluster records.
            for cluster in &grid.clusters {
                point_indices.extend(cluster.member_indices.iter().copied());
            }
        }

        let points: Vec<PointView> = point_indices
            .into_iter()
            .filter_map(|idx| {
                let (ranked, shown, highlighted) = candidates.get(idx)?;
                Some(PointView {
                    id: ranked.listing.id,
                    point: *shown,
                    price_cents: ranked.listing.price_cents,
                    property_type: ranked.listing.property_type,
                    sponsored: ranked.listing.is_currently_sponsored(now),
                    highlighted: *highlighted,
                })
            })
            .collect();

        Ok(MapView {
            clusters,
            points,
            bbox: request.bbox,
            zoom: request.zoom,
        })
    }
}
