//! Integration tests: end-to-end contours on small synthetic rasters.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use contour_mipmap::smooth::filter_short;
use contour_mipmap::walker::SegmentCollector;
use contour_mipmap::{ContourError, ContourMipmap, ContourOptions, Point, WindingOrder};

/// Raster from a closure over pixel centers.
fn raster(width: u32, height: u32, f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| f(f64::from(x) + 0.5, f64::from(y) + 0.5))
        .collect()
}

/// 8x8 cone peaking at the raster center.
fn cone() -> ContourMipmap {
    let samples = raster(8, 8, |x, y| -(x - 4.0).hypot(y - 4.0));
    ContourMipmap::new(&samples, 8, 8).unwrap()
}

/// 4x4 raster with two above-threshold pixels touching only at a corner.
/// The pixels sharing that corner hold a value below the threshold.
fn twin_peaks() -> ContourMipmap {
    #[rustfmt::skip]
    let samples = [
        0.0, 0.0, 0.0, 0.0,
        0.0, 9.0, 5.0, 0.0,
        0.0, 5.0, 9.0, 0.0,
        0.0, 0.0, 0.0, 0.0,
    ];
    ContourMipmap::new(&samples, 4, 4).unwrap()
}

#[test]
fn single_peak_is_one_ring() {
    let mipmap = cone();
    let (min, max) = mipmap.range().unwrap();
    let threshold = f64::midpoint(min, max);

    let lines = mipmap.contour(threshold, &ContourOptions::default()).unwrap();
    assert_eq!(lines.len(), 1, "expected exactly one contour");
    let ring = &lines[0];
    assert!(ring.is_ring());
    assert_eq!(ring.winding_order(), Some(WindingOrder::Clockwise));

    // Roughly circular around the center.
    let center = Point::new(4.0, 4.0);
    for p in ring.points() {
        let r = p.distance(center);
        assert!(r > 1.5 && r < 3.5, "point {p:?} at radius {r}");
    }
}

#[test]
fn diagonal_peaks_stay_separate() {
    let mipmap = twin_peaks();

    let traced = mipmap.trace(7.0, None).unwrap();
    assert_eq!(traced.len(), 2);
    for ring in &traced {
        assert!(ring.is_ring());
        assert_eq!(ring.len(), 5);
        assert!((ring.signed_area() + 1.0).abs() < f64::EPSILON);
    }

    let lines = mipmap.contour(7.0, &ContourOptions::default()).unwrap();
    assert_eq!(lines.len(), 2, "peaks must not merge across the saddle");
    assert!(lines.iter().all(contour_mipmap::Polyline::is_ring));
}

#[test]
fn diagonal_valleys_merge_into_one_region() {
    // Below the saddle value the peaks and saddle pixels form one 2x2
    // block with a single ring around it.
    let lines = twin_peaks().trace(3.0, None).unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].is_ring());
    assert_eq!(lines[0].len(), 9);
}

#[test]
fn missing_row_blocks_segments() {
    // Left half 0, right half 1, row 2 missing.
    let samples = raster(6, 6, |x, y| {
        if (2.0..3.0).contains(&y) {
            f64::NAN
        } else if x > 3.0 {
            1.0
        } else {
            0.0
        }
    });
    let mipmap = ContourMipmap::new(&samples, 6, 6).unwrap();

    let mut collector = SegmentCollector::new(mipmap.pyramid());
    mipmap.evaluate_contour(0.5, None, &mut collector).unwrap();
    let segments = collector.segments();
    assert!(!segments.is_empty());
    for s in segments {
        // Only the vertical data border at x = 3 is present.
        assert_eq!(s.start.x, 3);
        assert_eq!(s.end.x, 3);
        let (lo, hi) = (s.start.y.min(s.end.y), s.start.y.max(s.end.y));
        assert!(hi <= 2 || lo >= 3, "segment {s:?} crosses the missing row");
    }

    let lines = mipmap.trace(0.5, None).unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|pl| !pl.is_ring()));
}

#[test]
fn zero_cycles_returns_stitched_geometry() {
    let mipmap = cone();
    let options = ContourOptions {
        smooth_cycles: 0,
        ..ContourOptions::default()
    };
    for threshold in [-3.5, -2.5, -1.5] {
        let expected = filter_short(
            mipmap.trace(threshold, None).unwrap(),
            options.min_line_points(),
        );
        assert_eq!(mipmap.contour(threshold, &options).unwrap(), expected);
    }
}

#[test]
fn rings_are_closed_before_and_after_smoothing() {
    let samples = raster(32, 24, |x, y| (x / 3.0).sin() + (y / 4.0).cos());
    let mipmap = ContourMipmap::new(&samples, 32, 24).unwrap();
    for threshold in mipmap.intervals(0.25).unwrap() {
        for line in mipmap.trace(threshold, None).unwrap() {
            if line.first() == line.last() {
                assert!(line.is_ring());
            }
        }
        let options = ContourOptions {
            smooth_cycles: 4,
            ..ContourOptions::default()
        };
        for line in mipmap.contour(threshold, &options).unwrap() {
            if line.len() > 1 && line.first() == line.last() {
                assert!(line.is_ring());
                assert_eq!(line.points().first(), line.points().last());
            }
        }
    }
}

#[test]
fn rings_enclose_peaks_counterclockwise_on_screen() {
    let samples = raster(32, 24, |x, y| (x / 3.0).sin() * (y / 3.0).sin());
    let mipmap = ContourMipmap::new(&samples, 32, 24).unwrap();
    // Raw coordinates are y-down, so a visually counterclockwise ring has
    // negative shoelace area.
    let traced = mipmap.trace(0.5, None).unwrap();
    let rings: Vec<_> = traced.iter().filter(|pl| pl.is_ring()).collect();
    assert!(!rings.is_empty());
    assert!(rings.iter().all(|pl| pl.signed_area() < 0.0));
}

#[test]
fn contour_is_idempotent() {
    let mipmap = cone();
    let before = mipmap.pyramid().clone();
    let options = ContourOptions::default();
    let first = mipmap.contour(-2.0, &options).unwrap();
    let second = mipmap.contour(-2.0, &options).unwrap();
    assert_eq!(first, second);
    assert_eq!(mipmap.pyramid(), &before);
}

#[test]
fn intervals_lie_within_range() {
    let samples = raster(17, 9, |x, y| x.mul_add(0.37, -y * 1.3));
    let mipmap = ContourMipmap::new(&samples, 17, 9).unwrap();
    let (min, max) = mipmap.range().unwrap();
    let thresholds = mipmap.intervals(0.7).unwrap();
    assert!(!thresholds.is_empty());
    assert!(thresholds.windows(2).all(|w| w[0] < w[1]));
    for t in thresholds {
        assert!(min <= t && t < max, "{t} outside [{min}, {max})");
    }
}

#[test]
fn max_level_coarsens_output() {
    let mipmap = cone();
    let fine = mipmap.trace(-2.0, None).unwrap();
    let coarse = mipmap.trace(-2.0, Some(2)).unwrap();
    assert_eq!(fine.len(), 1);
    assert_eq!(coarse.len(), 1);
    assert!(coarse[0].len() < fine[0].len());
    // Coarse output stays on the level-2 grid (scale 2).
    for p in coarse[0].points() {
        assert!((p.x % 2.0).abs() < f64::EPSILON, "{p:?}");
        assert!((p.y % 2.0).abs() < f64::EPSILON, "{p:?}");
    }
}

#[test]
fn shared_pyramid_serves_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ContourMipmap>();

    let samples = raster(64, 64, |x, y| (x / 7.0).sin() * (y / 5.0).cos());
    let mipmap = ContourMipmap::new(&samples, 64, 64).unwrap();
    let options = ContourOptions::default();
    let thresholds = mipmap.intervals(0.2).unwrap();

    let sequential: Vec<_> = thresholds
        .iter()
        .map(|&t| mipmap.contour(t, &options).unwrap())
        .collect();

    let parallel: Vec<_> = std::thread::scope(|scope| {
        let mipmap = &mipmap;
        let options = &options;
        let handles: Vec<_> = thresholds
            .iter()
            .map(|&t| scope.spawn(move || mipmap.contour(t, options)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked").unwrap())
            .collect()
    });

    assert_eq!(sequential, parallel);
}

#[test]
fn invalid_arguments_are_rejected() {
    assert!(matches!(
        ContourMipmap::new(&[1.0, 2.0, 3.0], 2, 2),
        Err(ContourError::DimensionMismatch {
            expected: 4,
            actual: 3
        })
    ));
    assert!(matches!(
        ContourMipmap::new(&[], 0, 3),
        Err(ContourError::EmptyRaster { .. })
    ));

    let mipmap = cone();
    assert!(mipmap.intervals(0.0).is_err());
    assert!(mipmap.contours(-1.0, &ContourOptions::default()).is_err());
    assert!(
        mipmap
            .contour(f64::INFINITY, &ContourOptions::default())
            .is_err()
    );
}

#[test]
fn lines_convert_to_geo() {
    let lines = cone().contour(-2.5, &ContourOptions::default()).unwrap();
    let line_string = lines[0].to_line_string();
    assert!(line_string.is_closed());
    assert_eq!(line_string.0.len(), lines[0].len());
}
