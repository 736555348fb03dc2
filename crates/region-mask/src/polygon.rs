//! Validated region polygons.
//!
//! Rings are stored closed (first vertex repeated at the end). Coordinates
//! are (x, y) = (longitude, latitude) in degrees.

use geo::kernels::{Kernel, Orientation, RobustKernel};
use geo::Coord;
use terra_common::{BoundingBox, TerraError, TerraResult};

/// A simple polygon with optional holes.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPolygon {
    exterior: Vec<(f64, f64)>,
    holes: Vec<Vec<(f64, f64)>>,
    bbox: BoundingBox,
}

impl RegionPolygon {
    /// Validate and close the rings.
    ///
    /// Fails with `InvalidGeometry` for non-finite coordinates, rings with
    /// fewer than three distinct vertices or zero area, and rings whose
    /// edges cross or touch each other.
    pub fn new(exterior: Vec<(f64, f64)>, holes: Vec<Vec<(f64, f64)>>) -> TerraResult<Self> {
        let exterior = close_ring(exterior, "exterior ring")?;
        let holes = holes
            .into_iter()
            .enumerate()
            .map(|(i, h)| close_ring(h, &format!("hole {}", i)))
            .collect::<TerraResult<Vec<_>>>()?;

        let bbox = BoundingBox::from_points(exterior.iter().copied())
            .ok_or_else(|| TerraError::InvalidGeometry("exterior ring has no vertices".to_string()))?;

        Ok(Self { exterior, holes, bbox })
    }

    /// Axis-aligned rectangle.
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> TerraResult<Self> {
        Self::new(
            vec![(min_x, min_y), (max_x, min_y), (max_x, max_y), (min_x, max_y)],
            Vec::new(),
        )
    }

    pub fn exterior(&self) -> &[(f64, f64)] {
        &self.exterior
    }

    pub fn holes(&self) -> &[Vec<(f64, f64)>] {
        &self.holes
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Total number of edges across all rings.
    pub fn edge_count(&self) -> usize {
        self.rings().map(|r| r.len() - 1).sum()
    }

    /// Inside or on the boundary, by crossing-number ray casting over
    /// every edge.
    ///
    /// A point on any ring (hole boundaries included) is inside; a point
    /// strictly inside a hole is outside. Orientation signs are exact, so a
    /// point on a diagonal edge is always on the boundary.
    pub fn contains_or_touches(&self, x: f64, y: f64) -> bool {
        if !self.bbox.contains_point(x, y) {
            return false;
        }
        self.membership(|ring| ring_parity(self.ring(ring).windows(2).map(|w| (w[0], w[1])), (x, y)))
    }

    /// Combine per-ring parities into membership. Ring 0 is the exterior,
    /// ring `i + 1` is hole `i`. `parity` returns None when the point lies
    /// on that ring.
    pub(crate) fn membership<F>(&self, mut parity: F) -> bool
    where
        F: FnMut(usize) -> Option<bool>,
    {
        let in_exterior = match parity(0) {
            None => return true,
            Some(odd) => odd,
        };
        let mut in_hole = false;
        for ring in 1..=self.holes.len() {
            match parity(ring) {
                None => return true,
                Some(odd) => in_hole |= odd,
            }
        }
        in_exterior && !in_hole
    }

    /// Ring by index: 0 is the exterior, `i + 1` is hole `i`.
    pub(crate) fn ring(&self, index: usize) -> &[(f64, f64)] {
        match index {
            0 => &self.exterior,
            i => &self.holes[i - 1],
        }
    }

    pub(crate) fn ring_count(&self) -> usize {
        1 + self.holes.len()
    }

    fn rings(&self) -> impl Iterator<Item = &Vec<(f64, f64)>> {
        std::iter::once(&self.exterior).chain(self.holes.iter())
    }
}

/// How one ring edge relates to a sample point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeHit {
    /// The point lies on the closed segment.
    Boundary,
    /// A ray from the point towards +x crosses the edge (half-open in y).
    Crossing,
    Miss,
}

pub(crate) fn edge_hit(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> EdgeHit {
    let side = orientation(a, b, p);
    if side == Orientation::Collinear && within_box(a, b, p) {
        return EdgeHit::Boundary;
    }
    if (a.1 > p.1) != (b.1 > p.1) {
        // point left of an upward edge, or right of a downward one
        let west = if b.1 > a.1 {
            side == Orientation::CounterClockwise
        } else {
            side == Orientation::Clockwise
        };
        if west {
            return EdgeHit::Crossing;
        }
    }
    EdgeHit::Miss
}

/// Crossing parity of `p` over a set of edges, None if `p` is on one.
pub(crate) fn ring_parity<I>(edges: I, p: (f64, f64)) -> Option<bool>
where
    I: IntoIterator<Item = ((f64, f64), (f64, f64))>,
{
    let mut odd = false;
    for (a, b) in edges {
        match edge_hit(a, b, p) {
            EdgeHit::Boundary => return None,
            EdgeHit::Crossing => odd = !odd,
            EdgeHit::Miss => {}
        }
    }
    Some(odd)
}

fn close_ring(mut ring: Vec<(f64, f64)>, what: &str) -> TerraResult<Vec<(f64, f64)>> {
    if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(TerraError::InvalidGeometry(format!("{} has non-finite coordinates", what)));
    }

    ring.dedup();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }

    let mut distinct = ring.clone();
    distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    distinct.dedup();
    if distinct.len() < 3 {
        return Err(TerraError::InvalidGeometry(format!(
            "{} is empty: {} distinct vertices",
            what,
            distinct.len()
        )));
    }

    let first = ring[0];
    ring.push(first);
    if let Some((i, j)) = first_self_intersection(&ring) {
        return Err(TerraError::InvalidGeometry(format!(
            "{} is self-intersecting (edges {} and {})",
            what, i, j
        )));
    }
    if signed_area(&ring) == 0.0 {
        return Err(TerraError::InvalidGeometry(format!("{} has zero area", what)));
    }
    Ok(ring)
}

fn signed_area(ring: &[(f64, f64)]) -> f64 {
    ring.windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum::<f64>()
        / 2.0
}

fn orientation(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Orientation {
    let coord = |(x, y): (f64, f64)| Coord { x, y };
    <RobustKernel as Kernel<f64>>::orient2d(coord(a), coord(b), coord(c))
}

fn within_box(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

/// Closed-segment intersection, touching included.
fn segments_intersect(p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), p4: (f64, f64)) -> bool {
    use Orientation::{Clockwise, Collinear, CounterClockwise};

    let d1 = orientation(p3, p4, p1);
    let d2 = orientation(p3, p4, p2);
    let d3 = orientation(p1, p2, p3);
    let d4 = orientation(p1, p2, p4);

    let opposite = |u: Orientation, v: Orientation| {
        matches!((u, v), (Clockwise, CounterClockwise) | (CounterClockwise, Clockwise))
    };
    if opposite(d1, d2) && opposite(d3, d4) {
        return true;
    }
    (d1 == Collinear && within_box(p3, p4, p1))
        || (d2 == Collinear && within_box(p3, p4, p2))
        || (d3 == Collinear && within_box(p1, p2, p3))
        || (d4 == Collinear && within_box(p1, p2, p4))
}

/// First pair of edges that cross, touch, or fold back onto each other.
fn first_self_intersection(ring: &[(f64, f64)]) -> Option<(usize, usize)> {
    let n = ring.len() - 1;
    for i in 0..n {
        for j in i + 1..n {
            let (a, b) = (ring[i], ring[i + 1]);
            let (c, d) = (ring[j], ring[j + 1]);
            if j == i + 1 {
                // shared vertex b == c; only a fold back along the same line counts
                if orientation(a, b, d) == Orientation::Collinear && (d.0 - b.0) * (a.0 - b.0) + (d.1 - b.1) * (a.1 - b.1) > 0.0 {
                    return Some((i, j));
                }
            } else if i == 0 && j == n - 1 {
                // closing edge shares a == d
                if orientation(c, d, b) == Orientation::Collinear && (b.0 - a.0) * (c.0 - a.0) + (b.1 - a.1) * (c.1 - a.1) > 0.0 {
                    return Some((i, j));
                }
            } else if segments_intersect(a, b, c, d) {
                return Some((i, j));
            }
        }
    }
    None
}
