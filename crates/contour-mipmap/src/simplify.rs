//! Ramer-Douglas-Peucker simplification of smoothed contours.
//!
//! Smoothing leaves roughly one point per pixel of contour length. RDP
//! removes points that lie within `tolerance` of the chord between their
//! retained neighbors.
//!
//! The recursion is `geo`'s [`SimplifyIdx`]. Working on indices keeps
//! the retained points bit-identical to the input, so a ring's closing
//! point still equals its first. A ring that would collapse below four
//! points is returned unchanged.

use geo::SimplifyIdx;

use crate::types::{Point, Polyline};

/// Simplify a single polyline.
///
/// A tolerance of `0.0` (or any non-positive value) preserves all points.
/// Polylines with fewer than 3 points are returned unchanged.
#[must_use = "returns the simplified polyline"]
pub fn simplify(polyline: &Polyline, tolerance: f64) -> Polyline {
    let points = polyline.points();
    if points.len() < 3 || tolerance <= 0.0 {
        return polyline.clone();
    }

    let simplified: Vec<Point> = polyline
        .to_line_string()
        .simplify_idx(tolerance)
        .into_iter()
        .filter_map(|i| points.get(i).copied())
        .collect();

    if polyline.is_ring() && simplified.len() < 4 {
        return polyline.clone();
    }
    Polyline::new(simplified)
}

/// Simplify every polyline independently.
#[must_use = "returns the simplified polylines"]
pub fn simplify_lines(polylines: &[Polyline], tolerance: f64) -> Vec<Polyline> {
    polylines.iter().map(|pl| simplify(pl, tolerance)).collect()
}
