//! Geographic primitives: points, bounding boxes, great-circle distance,
//! and positional obfuscation for approximate-location listings.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::ListingId;

/// Mean Earth radius in kilometers, used by the haversine formula.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Jitter radius band for approximate-location listings, in meters.
const JITTER_MIN_METERS: f64 = 50.0;
/// Upper bound of the jitter radius band, in meters.
const JITTER_MAX_METERS: f64 = 150.0;

/// A WGS-84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

impl GeoPoint {
    /// Creates a new point from latitude and longitude in degrees.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to `other` in kilometers (haversine).
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS_KM * c
    }

    /// Displaces the point by a pseudo-random offset derived from the
    /// listing identifier.
    ///
    /// Bearing is drawn uniformly in `[0, 2π)` and radius uniformly in
    /// the 50–150 m band. The generator is seeded from the listing id,
    /// so the obfuscated position is stable across repeated queries
    /// while the true coordinate never leaves the core.
    #[must_use]
    pub fn obfuscated(&self, id: ListingId) -> Self {
        let bits = id.as_uuid().as_u128();
        #[allow(clippy::cast_possible_truncation)]
        let seed = (bits as u64) ^ ((bits >> 64) as u64);
        let mut rng = StdRng::seed_from_u64(seed);

        let bearing: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
        let radius_m: f64 = rng.gen_range(JITTER_MIN_METERS..=JITTER_MAX_METERS);

        let dlat = radius_m * bearing.cos() / METERS_PER_DEGREE;
        let lat_rad = self.lat.to_radians();
        // Longitude degrees shrink with latitude; guard the pole case.
        let lon_scale = lat_rad.cos().abs().max(1e-6);
        let dlon = radius_m * bearing.sin() / (METERS_PER_DEGREE * lon_scale);

        Self {
            lat: self.lat + dlat,
            lon: self.lon + dlon,
        }
    }
}

/// A west/south/east/north rectangle scoping a map viewport query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude bound in degrees.
    pub west: f64,
    /// Southern latitude bound in degrees.
    pub south: f64,
    /// Eastern longitude bound in degrees.
    pub east: f64,
    /// Northern latitude bound in degrees.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from its four edges.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Returns `true` if the box is well-formed: `west < east` and
    /// `south < north`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.west < self.east && self.south < self.north
    }

    /// Returns `true` if the point lies inside the box (inclusive).
    #[must_use]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lon >= self.west
            && point.lon <= self.east
            && point.lat >= self.south
            && point.lat <= self.north
    }

    /// Smallest box containing every point in `points`, or `None` when
    /// the iterator is empty.
    #[must_use]
    pub fn enclosing(points: &[GeoPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self::new(first.lon, first.lat, first.lon, first.lat);
        for p in points {
            bbox.west = bbox.west.min(p.lon);
            bbox.east = bbox.east.max(p.lon);
            bbox.south = bbox.south.min(p.lat);
            bbox.north = bbox.north.max(p.lat);
        }
        Some(bbox)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn haversine_paris_landmarks() {
        // Notre-Dame to the Arc de Triomphe is roughly 4.2 km.
        let notre_dame = GeoPoint::new(48.8530, 2.3499);
        let arc = GeoPoint::new(48.8738, 2.2950);
        let d = notre_dame.distance_km(&arc);
        assert!(d > 3.5 && d < 5.0, "unexpected distance {d}");
    }

    #[test]
    fn haversine_radius_boundary_cases() {
        // The 10 km radius example from the search contract.
        let center = GeoPoint::new(48.8566, 2.3522);
        let outside = GeoPoint::new(48.95, 2.35);
        let inside = GeoPoint::new(48.90, 2.35);
        assert!(center.distance_km(&outside) > 10.0);
        assert!(center.distance_km(&inside) < 10.0);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = GeoPoint::new(43.6045, 1.4442);
        assert!(p.distance_km(&p) < 1e-9);
    }

    #[test]
    fn obfuscation_is_deterministic_per_listing() {
        let p = GeoPoint::new(48.8566, 2.3522);
        let id = ListingId::new();
        let a = p.obfuscated(id);
        let b = p.obfuscated(id);
        assert_eq!(a, b);
    }

    #[test]
    fn obfuscation_differs_between_listings() {
        let p = GeoPoint::new(48.8566, 2.3522);
        let a = p.obfuscated(ListingId::new());
        let b = p.obfuscated(ListingId::new());
        assert_ne!(a, b);
    }

    #[test]
    fn obfuscation_stays_in_radius_band() {
        let p = GeoPoint::new(48.8566, 2.3522);
        for _ in 0..20 {
            let moved = p.obfuscated(ListingId::new());
            let d_m = p.distance_km(&moved) * 1000.0;
            assert!(
                d_m >= JITTER_MIN_METERS * 0.9 && d_m <= JITTER_MAX_METERS * 1.1,
                "offset {d_m} m outside band"
            );
        }
    }

    #[test]
    fn bbox_validity() {
        assert!(BoundingBox::new(2.0, 48.0, 3.0, 49.0).is_valid());
        assert!(!BoundingBox::new(3.0, 48.0, 2.0, 49.0).is_valid());
        assert!(!BoundingBox::new(2.0, 49.0, 3.0, 48.0).is_valid());
        assert!(!BoundingBox::new(2.0, 48.0, 2.0, 48.0).is_valid());
    }

    #[test]
    fn bbox_contains_edge_points() {
        let bbox = BoundingBox::new(2.0, 48.0, 3.0, 49.0);
        assert!(bbox.contains(&GeoPoint::new(48.0, 2.0)));
        assert!(bbox.contains(&GeoPoint::new(48.5, 2.5)));
        assert!(!bbox.contains(&GeoPoint::new(47.9, 2.5)));
    }

    #[test]
    fn enclosing_box_spans_all_points() {
        let points = vec![
            GeoPoint::new(48.1, 2.1),
            GeoPoint::new(48.9, 2.9),
            GeoPoint::new(48.5, 2.0),
        ];
        let Some(bbox) = BoundingBox::enclosing(&points) else {
            panic!("expected a box");
        };
        assert_eq!(bbox.west, 2.0);
        assert_eq!(bbox.east, 2.9);
        assert_eq!(bbox.south, 48.1);
        assert_eq!(bbox.north, 48.9);
        assert!(BoundingBox::enclosing(&[]).is_none());
    }
}
