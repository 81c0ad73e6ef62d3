//! Iterated box-filter smoothing of contour polylines.
//!
//! Stitched contours follow cell borders, so they are staircases. A few
//! cycles of a small moving average turn them into smooth curves.
//!
//! Rings use a circular window over their unique points and are closed
//! again after every cycle, so `first == last` holds exactly. Open lines
//! clamp the window by repeating their endpoints; the endpoints drift
//! slightly toward the interior as a result.

use crate::types::{Point, Polyline};

/// Smooth a single polyline with `cycles` passes of a box filter of
/// half-width `kernel_width` (window size `2 * kernel_width + 1`).
///
/// `cycles == 0` or `kernel_width == 0` returns the input unchanged.
#[must_use = "returns the smoothed polyline"]
pub fn smooth_polyline(polyline: &Polyline, kernel_width: usize, cycles: usize) -> Polyline {
    if cycles == 0 || kernel_width == 0 || polyline.len() < 3 {
        return polyline.clone();
    }

    if polyline.is_ring() {
        let points = polyline.points();
        let mut unique = points[..points.len() - 1].to_vec();
        for _ in 0..cycles {
            unique = box_filter_circular(&unique, kernel_width);
        }
        if let Some(&first) = unique.first() {
            unique.push(first);
        }
        Polyline::new(unique)
    } else {
        let mut points = polyline.points().to_vec();
        for _ in 0..cycles {
            points = box_filter_clamped(&points, kernel_width);
        }
        Polyline::new(points)
    }
}

/// Smooth every polyline independently.
#[must_use = "returns the smoothed polylines"]
pub fn smooth_lines(polylines: &[Polyline], kernel_width: usize, cycles: usize) -> Vec<Polyline> {
    polylines
        .iter()
        .map(|pl| smooth_polyline(pl, kernel_width, cycles))
        .collect()
}

/// Drop polylines with fewer than `min_points` points.
#[must_use = "returns the retained polylines"]
pub fn filter_short(polylines: Vec<Polyline>, min_points: usize) -> Vec<Polyline> {
    polylines
        .into_iter()
        .filter(|pl| pl.len() >= min_points)
        .collect()
}

/// One moving-average pass with wrap-around indexing.
fn box_filter_circular(points: &[Point], kernel_width: usize) -> Vec<Point> {
    let n = points.len();
    if n == 0 {
        return Vec::new();
    }
    // i - kernel_width, kept non-negative modulo n.
    let shift = n - kernel_width % n;
    (0..n)
        .map(|i| average((0..=2 * kernel_width).map(|offset| points[(i + shift + offset) % n])))
        .collect()
}

/// One moving-average pass with indices clamped to the endpoints.
fn box_filter_clamped(points: &[Point], kernel_width: usize) -> Vec<Point> {
    let last = points.len().saturating_sub(1);
    (0..points.len())
        .map(|i| {
            average(
                (0..=2 * kernel_width)
                    .map(|offset| points[(i + offset).saturating_sub(kernel_width).min(last)]),
            )
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn average(window: impl Iterator<Item = Point>) -> Point {
    let (mut x, mut y, mut count) = (0.0, 0.0, 0usize);
    for p in window {
        x += p.x;
        y += p.y;
        count += 1;
    }
    let count = count.max(1) as f64;
    Point::new(x / count, y / count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[(f64, f64)]) -> Polyline {
        Polyline::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    fn square_ring() -> Polyline {
        line(&[
            (0.0, 0.0),
            (0.0, 1.0),
            (0.0, 2.0),
            (1.0, 2.0),
            (2.0, 2.0),
            (2.0, 1.0),
            (2.0, 0.0),
            (1.0, 0.0),
            (0.0, 0.0),
        ])
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn zero_cycles_is_identity() {
        let ring = square_ring();
        assert_eq!(smooth_polyline(&ring, 2, 0), ring);
    }

    #[test]
    fn zero_kernel_is_identity() {
        let open = line(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)]);
        assert_eq!(smooth_polyline(&open, 0, 3), open);
    }

    #[test]
    fn ring_stays_exactly_closed() {
        for cycles in 1..6 {
            let smoothed = smooth_polyline(&square_ring(), 2, cycles);
            assert_eq!(smoothed.len(), 9);
            assert!(smoothed.is_ring(), "cycles = {cycles}");
            assert_eq!(smoothed.first(), smoothed.last());
        }
    }

    #[test]
    fn ring_centroid_is_preserved() {
        let smoothed = smooth_polyline(&square_ring(), 1, 4);
        let unique = &smoothed.points()[..smoothed.len() - 1];
        #[allow(clippy::cast_precision_loss)]
        let n = unique.len() as f64;
        let cx: f64 = unique.iter().map(|p| p.x).sum::<f64>() / n;
        let cy: f64 = unique.iter().map(|p| p.y).sum::<f64>() / n;
        assert!(approx(cx, 1.0));
        assert!(approx(cy, 1.0));
    }

    #[test]
    fn ring_corners_are_rounded() {
        let smoothed = smooth_polyline(&square_ring(), 1, 1);
        // The (0, 0) corner moves toward the interior.
        let corner = smoothed.points()[0];
        assert!(corner.x > 0.0 && corner.y > 0.0);
    }

    #[test]
    fn each_cycle_reads_the_previous_buffer() {
        let open = line(&[(0.0, 0.0), (3.0, 0.0), (6.0, 0.0), (9.0, 0.0)]);

        let once = smooth_polyline(&open, 1, 1);
        let xs: Vec<f64> = once.points().iter().map(|p| p.x).collect();
        for (got, want) in xs.iter().zip([1.0, 3.0, 6.0, 8.0]) {
            assert!(approx(*got, want), "{xs:?}");
        }

        let twice = smooth_polyline(&open, 1, 2);
        let xs: Vec<f64> = twice.points().iter().map(|p| p.x).collect();
        for (got, want) in xs.iter().zip([5.0 / 3.0, 10.0 / 3.0, 17.0 / 3.0, 22.0 / 3.0]) {
            assert!(approx(*got, want), "{xs:?}");
        }
    }

    #[test]
    fn open_endpoints_drift_inward() {
        let open = line(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]);
        let smoothed = smooth_polyline(&open, 2, 1);
        assert!(!smoothed.is_ring());
        let first = smoothed.points()[0];
        let last = smoothed.points()[4];
        assert!(first.x > 0.0 && first.x < 1.0);
        assert!(last.x > 3.0 && last.x < 4.0);
        // Straight lines stay straight.
        assert!(smoothed.points().iter().all(|p| approx(p.y, 0.0)));
    }

    #[test]
    fn kernel_wider_than_ring() {
        let ring = line(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0)]);
        let smoothed = smooth_polyline(&ring, 5, 2);
        assert!(smoothed.is_ring());
        assert_eq!(smoothed.len(), 4);
    }

    #[test]
    fn filter_short_drops_below_minimum() {
        let lines = vec![
            line(&[(0.0, 0.0), (1.0, 0.0)]),
            square_ring(),
            line(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]),
        ];
        let kept = filter_short(lines, 4);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|pl| pl.len() >= 4));
    }

    #[test]
    fn smooth_lines_maps_each() {
        let lines = vec![square_ring(), line(&[(0.0, 0.0), (2.0, 2.0), (4.0, 0.0)])];
        let smoothed = smooth_lines(&lines, 1, 1);
        assert_eq!(smoothed.len(), 2);
        assert!(smoothed[0].is_ring());
        assert!(!smoothed[1].is_ring());
    }
}
