//! Point-in-region strategies.
//!
//! Both strategies answer the same question for one mesh row at a time:
//! which sample points lie inside or on the boundary of at least one
//! polygon. `Naive` ray-casts every point against every edge. `Indexed`
//! keeps, per ring, the edges sorted into horizontal bands so a point only
//! visits the edges whose y-range can reach it. Both classify each edge with
//! the same exact test, so they agree on every point, boundary points
//! included.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use terra_common::TerraError;

use crate::polygon::{ring_parity, RegionPolygon};

/// How mask membership is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskStrategy {
    /// Banded edge index with bounding-box prefiltering, rows evaluated in
    /// parallel.
    #[default]
    Indexed,
    /// Sequential ray casting of every point against every edge. Slow on
    /// large grids; kept as a reference and fallback.
    Naive,
}

impl fmt::Display for MaskStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskStrategy::Indexed => write!(f, "indexed"),
            MaskStrategy::Naive => write!(f, "naive"),
        }
    }
}

impl FromStr for MaskStrategy {
    type Err = TerraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "indexed" => Ok(MaskStrategy::Indexed),
            "naive" => Ok(MaskStrategy::Naive),
            other => Err(TerraError::invalid_parameter(
                "mask.strategy",
                format!("unknown strategy '{}', expected 'indexed' or 'naive'", other),
            )),
        }
    }
}

/// Where each grid cell is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePosition {
    /// Test the grid coordinate itself.
    #[default]
    Node,
    /// Coordinates are cell corners; test the centre of each cell, halfway to
    /// the next coordinate. The last cell reuses the previous spacing.
    CellCorner,
}

/// Membership test for one row of sample points.
pub(crate) trait RowLocator: Sync {
    fn locate_row(&self, points: &[(f64, f64)]) -> Vec<bool>;
}

pub(crate) struct NaiveLocator<'a> {
    polygons: &'a [RegionPolygon],
}

impl<'a> NaiveLocator<'a> {
    pub(crate) fn new(polygons: &'a [RegionPolygon]) -> Self {
        Self { polygons }
    }
}

impl RowLocator for NaiveLocator<'_> {
    fn locate_row(&self, points: &[(f64, f64)]) -> Vec<bool> {
        points
            .iter()
            .map(|&(x, y)| self.polygons.iter().any(|p| p.contains_or_touches(x, y)))
            .collect()
    }
}

/// Upper bound on bands per ring.
const MAX_BANDS: usize = 4096;

type Edge = ((f64, f64), (f64, f64));

/// Edges of one ring bucketed by y.
///
/// An edge is filed under every band between the bands of its lowest and
/// highest vertex. `band_of` is monotonic in y, so any point whose y lies
/// within an edge's y-range looks up a band holding that edge.
struct EdgeBands {
    min_y: f64,
    scale: f64,
    bands: Vec<Vec<Edge>>,
}

impl EdgeBands {
    fn new(ring: &[(f64, f64)]) -> Self {
        let edges: Vec<Edge> = ring.windows(2).map(|w| (w[0], w[1])).collect();
        let (min_y, max_y) = ring
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)));

        let count = edges.len().clamp(1, MAX_BANDS);
        let scale = count as f64 / (max_y - min_y);
        let mut index = Self {
            min_y,
            scale: if scale.is_finite() { scale } else { 0.0 },
            bands: vec![Vec::new(); count],
        };
        for edge in edges {
            let lo = index.band_of(edge.0 .1.min(edge.1 .1));
            let hi = index.band_of(edge.0 .1.max(edge.1 .1));
            for band in &mut index.bands[lo..=hi] {
                band.push(edge);
            }
        }
        index
    }

    fn band_of(&self, y: f64) -> usize {
        // float-to-int casts saturate, negatives land in band 0
        (((y - self.min_y) * self.scale).floor() as usize).min(self.bands.len() - 1)
    }

    fn parity(&self, p: (f64, f64)) -> Option<bool> {
        ring_parity(self.bands[self.band_of(p.1)].iter().copied(), p)
    }
}

struct IndexedPolygon<'a> {
    polygon: &'a RegionPolygon,
    rings: Vec<EdgeBands>,
}

impl IndexedPolygon<'_> {
    fn contains_or_touches(&self, x: f64, y: f64) -> bool {
        if !self.polygon.bbox().contains_point(x, y) {
            return false;
        }
        self.polygon.membership(|ring| self.rings[ring].parity((x, y)))
    }
}

pub(crate) struct IndexedLocator<'a> {
    indexed: Vec<IndexedPolygon<'a>>,
}

impl<'a> IndexedLocator<'a> {
    pub(crate) fn new(polygons: &'a [RegionPolygon]) -> Self {
        let indexed = polygons
            .iter()
            .map(|polygon| IndexedPolygon {
                polygon,
                rings: (0..polygon.ring_count()).map(|i| EdgeBands::new(polygon.ring(i))).collect(),
            })
            .collect();
        Self { indexed }
    }

    /// Polygons whose bounding box overlaps the row's latitude band.
    fn band_candidates(&self, min_y: f64, max_y: f64) -> Vec<&IndexedPolygon<'a>> {
        self.indexed
            .iter()
            .filter(|p| p.polygon.bbox().min_y <= max_y && p.polygon.bbox().max_y >= min_y)
            .collect()
    }
}

impl RowLocator for IndexedLocator<'_> {
    fn locate_row(&self, points: &[(f64, f64)]) -> Vec<bool> {
        let (min_y, max_y) = points
            .iter()
            .filter(|(_, y)| y.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)));
        let candidates = self.band_candidates(min_y, max_y);
        if candidates.is_empty() {
            return vec![false; points.len()];
        }

        points
            .iter()
            .map(|&(x, y)| candidates.iter().any(|p| p.contains_or_touches(x, y)))
            .collect()
    }
}
