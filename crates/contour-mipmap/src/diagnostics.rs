//! Contour diagnostics: timing and counts for each stage of one
//! [`contour`](crate::ContourMipmap::contour) call.
//!
//! Intended for tuning smoothing and level parameters against real
//! rasters. Timing goes through the [`Clock`] trait so the library does
//! not pick a time source; the bench binary supplies one backed by
//! [`std::time::Instant`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mipmap::ContourMipmap;
use crate::simplify::simplify_lines;
use crate::smooth::{filter_short, smooth_lines};
use crate::stitch::stitch_segments;
use crate::types::{ContourError, ContourOptions, Polyline};
use crate::walker::{LeafTally, SegmentCollector, Tee, evaluate_contour};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] that never advances. Plain contour calls run the staged
/// pipeline with it and drop the timings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single contour run.
///
/// `simplify` is `None` when `simplify_tolerance` is zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContourDiagnostics {
    /// Threshold that was contoured.
    pub threshold: f64,
    /// Quadtree walk.
    pub walk: StageDiagnostics,
    /// Segment stitching.
    pub stitch: StageDiagnostics,
    /// Minimum-length filter.
    pub filter: StageDiagnostics,
    /// Box-filter smoothing.
    pub smooth: StageDiagnostics,
    /// RDP simplification.
    pub simplify: Option<StageDiagnostics>,
    /// Total wall-clock duration (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: ContourSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Quadtree walk metrics.
    Walk {
        /// Effective traversal limit.
        max_level: usize,
        /// Leaves classified outside.
        outside: usize,
        /// Leaves classified above.
        above: usize,
        /// Leaves classified below.
        below: usize,
        /// Deepest level a leaf was found on.
        deepest_level: usize,
        /// Segments emitted.
        segment_count: usize,
    },
    /// Stitching metrics.
    Stitch {
        /// Closed rings.
        ring_count: usize,
        /// Open polylines.
        open_count: usize,
        /// Total points across all lines.
        point_count: usize,
    },
    /// Minimum-length filter metrics.
    Filter {
        /// Effective minimum point count.
        min_points: usize,
        /// Lines before filtering.
        lines_before: usize,
        /// Lines after filtering.
        lines_after: usize,
    },
    /// Smoothing metrics.
    Smooth {
        /// Box filter half-width.
        kernel_width: usize,
        /// Number of passes.
        cycles: usize,
        /// Total points (unchanged by smoothing).
        point_count: usize,
    },
    /// Simplification metrics.
    Simplify {
        /// RDP tolerance in pixels.
        tolerance: f64,
        /// Total points before simplification.
        points_before: usize,
        /// Total points after simplification.
        points_after: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
}

/// High-level summary counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContourSummary {
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in pixels.
    pub height: u32,
    /// Number of pyramid levels.
    pub depth: usize,
    /// Lines in the final output.
    pub line_count: usize,
    /// Closed rings in the final output.
    pub ring_count: usize,
    /// Points in the final output.
    pub final_point_count: usize,
}

impl ContourDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Contour Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Raster: {}x{} ({} levels)  Threshold: {}",
            self.summary.width, self.summary.height, self.summary.depth, self.threshold,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages = vec![
            ("Walk", &self.walk),
            ("Stitch", &self.stitch),
            ("Filter", &self.filter),
            ("Smooth", &self.smooth),
        ];
        if let Some(ref s) = self.simplify {
            stages.push(("Simplify", s));
        }

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Lines: {} ({} rings)  |  Final points: {}",
            self.summary.line_count, self.summary.ring_count, self.summary.final_point_count,
        ));

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Walk {
            max_level,
            outside,
            above,
            below,
            deepest_level,
            segment_count,
        } => format!(
            "limit={max_level} deepest={deepest_level} leaves out={outside} above={above} below={below}, {segment_count} segments",
        ),
        StageMetrics::Stitch {
            ring_count,
            open_count,
            point_count,
        } => format!("{ring_count} rings, {open_count} open, {point_count} pts"),
        StageMetrics::Filter {
            min_points,
            lines_before,
            lines_after,
        } => format!("min={min_points} lines {lines_before}->{lines_after}"),
        StageMetrics::Smooth {
            kernel_width,
            cycles,
            point_count,
        } => format!("k={kernel_width} cycles={cycles} {point_count} pts"),
        StageMetrics::Simplify {
            tolerance,
            points_before,
            points_after,
            reduction_ratio,
        } => format!(
            "tol={tolerance:.2} {points_before}->{points_after} pts ({:.1}% reduction)",
            reduction_ratio * 100.0,
        ),
    }
}

/// Total points across a slice of polylines.
pub(crate) fn total_points(polylines: &[Polyline]) -> usize {
    polylines.iter().map(Polyline::len).sum()
}

/// Run one contour with per-stage timing.
///
/// This is the only implementation of the contour stages;
/// [`ContourMipmap::contour`](crate::ContourMipmap::contour) calls it with
/// [`NoClock`].
///
/// # Errors
///
/// Same as [`ContourMipmap::contour`](crate::ContourMipmap::contour).
pub fn contour_with_diagnostics<C: Clock>(
    mipmap: &ContourMipmap,
    threshold: f64,
    options: &ContourOptions,
    clock: &C,
) -> Result<(Vec<Polyline>, ContourDiagnostics), ContourError> {
    ContourMipmap::check_threshold(threshold)?;
    options.validate()?;

    let pyramid = mipmap.pyramid();
    let total_start = clock.now();

    // Walk.
    let start = clock.now();
    let mut tally = LeafTally::default();
    let mut collector = SegmentCollector::new(pyramid);
    evaluate_contour(
        pyramid,
        threshold,
        options.max_level,
        &mut Tee(&mut collector, &mut tally),
    );
    let segments = collector.into_segments();
    let walk = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Walk {
            max_level: options
                .max_level
                .map_or(pyramid.depth(), |m| m.min(pyramid.depth())),
            outside: tally.outside,
            above: tally.above,
            below: tally.below,
            deepest_level: tally.deepest_level,
            segment_count: segments.len(),
        },
    };

    // Stitch.
    let start = clock.now();
    let stitched = stitch_segments(&segments)?;
    let (ring_count, open_count) = (stitched.rings.len(), stitched.open.len());
    let traced = stitched.into_polylines();
    let stitch = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Stitch {
            ring_count,
            open_count,
            point_count: total_points(&traced),
        },
    };

    // Filter.
    let start = clock.now();
    let lines_before = traced.len();
    let min_points = options.min_line_points();
    let kept = filter_short(traced, min_points);
    let filter = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Filter {
            min_points,
            lines_before,
            lines_after: kept.len(),
        },
    };

    // Smooth.
    let start = clock.now();
    let smoothed = smooth_lines(&kept, options.smooth_kernel_width, options.smooth_cycles);
    let smooth = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Smooth {
            kernel_width: options.smooth_kernel_width,
            cycles: options.smooth_cycles,
            point_count: total_points(&smoothed),
        },
    };

    // Simplify.
    let (lines, simplify) = if options.simplify_tolerance > 0.0 {
        let start = clock.now();
        let points_before = total_points(&smoothed);
        let reduced = simplify_lines(&smoothed, options.simplify_tolerance);
        let points_after = total_points(&reduced);
        #[allow(clippy::cast_precision_loss)]
        let reduction_ratio = if points_before > 0 {
            1.0 - (points_after as f64 / points_before as f64)
        } else {
            0.0
        };
        let diag = StageDiagnostics {
            duration: clock.elapsed(&start),
            metrics: StageMetrics::Simplify {
                tolerance: options.simplify_tolerance,
                points_before,
                points_after,
                reduction_ratio,
            },
        };
        (reduced, Some(diag))
    } else {
        (smoothed, None)
    };

    tracing::debug!(
        threshold,
        segments = segments.len(),
        traced = lines_before,
        kept = lines.len(),
        "contour complete"
    );

    let dimensions = pyramid.dimensions();
    let diagnostics = ContourDiagnostics {
        threshold,
        walk,
        stitch,
        filter,
        smooth,
        simplify,
        total_duration: clock.elapsed(&total_start),
        summary: ContourSummary {
            width: dimensions.width,
            height: dimensions.height,
            depth: pyramid.depth(),
            line_count: lines.len(),
            ring_count: lines.iter().filter(|pl| pl.is_ring()).count(),
            final_point_count: total_points(&lines),
        },
    };

    Ok((lines, diagnostics))
}
