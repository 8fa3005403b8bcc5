//! Zoom-dependent grid clustering for map viewports.
//!
//! Candidates are binned into a square grid whose cell edge shrinks as
//! the zoom level grows. Dense cells collapse into cluster records;
//! lone points stay individual markers.

use std::collections::BTreeMap;

use super::geo::{BoundingBox, GeoPoint};

/// Zoom level from which cluster member points are also emitted
/// individually — the renderer decides which representation to draw.
pub const DETAIL_ZOOM: u8 = 15;

/// Grid cell edge length in degrees for a zoom level.
///
/// Coarser zoom → larger cells → more aggressive clustering.
#[must_use]
pub const fn cell_size_degrees(zoom: u8) -> f64 {
    match zoom {
        0..=7 => 0.5,
        8..=9 => 0.2,
        10..=11 => 0.05,
        12..=13 => 0.02,
        14..=15 => 0.005,
        _ => 0.0015,
    }
}

/// Candidate pool cap for a zoom level.
///
/// A broad viewport only needs enough points to seed clusters; fine
/// zoom needs individual markers.
#[must_use]
pub const fn candidate_cap(zoom: u8) -> usize {
    match zoom {
        0..=7 => 150,
        8..=9 => 250,
        10..=11 => 400,
        12..=13 => 700,
        14..=15 => 1200,
        _ => 2000,
    }
}

/// An aggregated grid cell holding more than one point.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Number of member points.
    pub count: usize,
    /// Arithmetic mean of the member coordinates.
    pub center: GeoPoint,
    /// Bounding rectangle of the member coordinates.
    pub bbox: BoundingBox,
    /// Indices of the members in the input slice.
    pub member_indices: Vec<usize>,
}

/// Result of one clustering pass: dense cells and lone markers, both
/// as indices into the input slice.
#[derive(Debug, Clone)]
pub struct GridClustering {
    /// Cells with two or more points.
    pub clusters: Vec<Cluster>,
    /// Indices of points that ended up alone in their cell.
    pub singletons: Vec<usize>,
}

/// Bins `points` into the zoom-level grid.
///
/// Cell assignment floors `(lon, lat) / cell_size`. Output order is
/// deterministic (cells sorted by grid key, members in input order).
#[must_use]
pub fn cluster_points(points: &[GeoPoint], zoom: u8) -> GridClustering {
    let cell = cell_size_degrees(zoom);
    let mut cells: BTreeMap<(i64, i64), Vec<usize>> = BTreeMap::new();

    for (idx, point) in points.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let key = (
            (point.lon / cell).floor() as i64,
            (point.lat / cell).floor() as i64,
        );
        cells.entry(key).or_default().push(idx);
    }

    let mut clusters = Vec::new();
    let mut singletons = Vec::new();

    for members in cells.into_values() {
        if members.len() == 1 {
            singletons.extend(members);
            continue;
        }

        let coords: Vec<GeoPoint> = members
            .iter()
            .filter_map(|&i| points.get(i).copied())
            .collect();
        let count = coords.len();
        #[allow(clippy::cast_precision_loss)]
        let n = count as f64;
        let center = GeoPoint::new(
            coords.iter().map(|p| p.lat).sum::<f64>() / n,
            coords.iter().map(|p| p.lon).sum::<f64>() / n,
        );
        let Some(bbox) = BoundingBox::enclosing(&coords) else {
            continue;
        };

        clusters.push(Cluster {
            count,
            center,
            bbox,
            member_indices: members,
        });
    }

    GridClustering {
        clusters,
        singletons,
    }
}
