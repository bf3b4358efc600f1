//! Planar geometry in metres.
//!
//! Positions, lane shapes and radii all live in the world's flat x/y plane,
//! so Euclidean distance is exact; there is no lat/lon projection step.

use serde::{Deserialize, Serialize};

/// A 2-D point in metres.
#[derive(Copy, Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(self, other: Point) -> f64 {
        self.distance_sq(other).sqrt()
    }

    #[inline]
    pub fn distance_sq(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Linear interpolation; `t = 0` is `self`, `t = 1` is `other`.
    #[inline]
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

// ── Polylines ─────────────────────────────────────────────────────────────────

/// Total length of the polyline through `points`.
pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// The point `offset` metres along the polyline, clamped to its ends.
///
/// Returns `None` for an empty polyline.
pub fn point_along(points: &[Point], offset: f64) -> Option<Point> {
    let first = *points.first()?;
    if offset <= 0.0 {
        return Some(first);
    }
    let mut remaining = offset;
    for w in points.windows(2) {
        let seg = w[0].distance(w[1]);
        if remaining <= seg {
            if seg == 0.0 {
                return Some(w[0]);
            }
            return Some(w[0].lerp(w[1], remaining / seg));
        }
        remaining -= seg;
    }
    points.last().copied()
}

/// Index of the point in `points` nearest to `p` (first one on ties).
pub fn nearest_index(points: &[Point], p: Point) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.distance_sq(p).total_cmp(&b.distance_sq(p)))
        .map(|(i, _)| i)
}
