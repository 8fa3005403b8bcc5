//! Map viewport endpoint DTOs.

use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::domain::{BoundingBox, GeoPoint, ListingId};
use crate::service::map::{ClusterView, MapView, PointView};

/// Query parameters for `GET /listings/map`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct MapParams {
    /// Western longitude bound.
    pub west: f64,
    /// Southern latitude bound.
    pub south: f64,
    /// Eastern longitude bound.
    pub east: f64,
    /// Northern latitude bound.
    pub north: f64,
    /// Tile zoom level.
    pub zoom: u8,
    /// Comma-separated property types.
    pub types: Option<String>,
    /// Minimum price in euro cents.
    pub price_min: Option<i64>,
    /// Maximum price in euro cents.
    pub price_max: Option<i64>,
}

/// An aggregated marker.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterDto {
    /// Number of member listings.
    pub count: usize,
    /// Cluster centroid.
    pub center: GeoPoint,
    /// Member bounding rectangle.
    pub bbox: BoundingBox,
}

impl From<&ClusterView> for ClusterDto {
    fn from(view: &ClusterView) -> Self {
        Self {
            count: view.count,
            center: view.center,
            bbox: view.bbox,
        }
    }
}

/// An individual marker.
#[derive(Debug, Clone, Serialize)]
pub struct MapPointDto {
    /// Listing identifier.
    pub id: ListingId,
    /// Marker coordinate (obfuscated for approximate locations).
    pub point: GeoPoint,
    /// Price in euro cents.
    pub price_cents: i64,
    /// Property type string.
    pub property_type: String,
    /// Whether the listing is currently sponsored.
    pub sponsored: bool,
    /// Whether the owning agency's pack highlights the marker.
    pub highlighted: bool,
}

impl From<&PointView> for MapPointDto {
    fn from(view: &PointView) -> Self {
        Self {
            id: view.id,
            point: view.point,
            price_cents: view.price_cents,
            property_type: view.property_type.as_str().to_string(),
            sponsored: view.sponsored,
            highlighted: view.highlighted,
        }
    }
}

/// Response body for `GET /listings/map`.
#[derive(Debug, Clone, Serialize)]
pub struct MapResponse {
    /// Dense-cell aggregates.
    pub clusters: Vec<ClusterDto>,
    /// Individual markers.
    pub points: Vec<MapPointDto>,
    /// Echo of the requested viewport.
    pub bbox: BoundingBox,
    /// Echo of the requested zoom.
    pub zoom: u8,
}

impl From<MapView> for MapResponse {
    fn from(view: MapView) -> Self {
        Self {
            clusters: view.clusters.iter().map(ClusterDto::from).collect(),
            points: view.points.iter().map(MapPointDto::from).collect(),
            bbox: view.bbox,
            zoom: view.zoom,
        }
    }
}
