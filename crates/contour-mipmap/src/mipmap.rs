//! The [`ContourMipmap`] façade: one pyramid, many threshold queries.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Clock, ContourDiagnostics, NoClock};
use crate::pyramid::MipmapPyramid;
use crate::stitch::stitch_segments;
use crate::types::{ContourError, ContourOptions, Dimensions, Polyline};
use crate::walker::{self, ContourVisitor, SegmentCollector};

/// All iso-lines at one threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolineSet {
    /// Threshold the lines were traced at.
    pub threshold: f64,
    /// Lines in pixel coordinates, rings first.
    pub lines: Vec<Polyline>,
}

/// A raster's min/max pyramid plus contour extraction over it.
///
/// Built once per raster. Every query borrows it immutably, so a single
/// instance can serve concurrent `contour` calls from several threads.
///
/// ```
/// use contour_mipmap::{ContourMipmap, ContourOptions};
///
/// let mut raster = vec![0.0; 64];
/// for y in 2..6 {
///     for x in 2..6 {
///         raster[y * 8 + x] = 10.0;
///     }
/// }
/// let mipmap = ContourMipmap::new(&raster, 8, 8)?;
/// let lines = mipmap.contour(5.0, &ContourOptions::default())?;
/// assert_eq!(lines.len(), 1);
/// assert!(lines[0].is_ring());
/// # Ok::<(), contour_mipmap::ContourError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ContourMipmap {
    pyramid: MipmapPyramid,
}

impl ContourMipmap {
    /// Build the pyramid for a row-major raster.
    ///
    /// Missing samples should be `NaN`; infinities are treated the same.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::EmptyRaster`] if either dimension is zero
    /// and [`ContourError::DimensionMismatch`] if `raster.len()` is not
    /// `width * height`.
    pub fn new(raster: &[f64], width: u32, height: u32) -> Result<Self, ContourError> {
        let pyramid = MipmapPyramid::build(raster, Dimensions { width, height })?;
        Ok(Self { pyramid })
    }

    /// Wrap an already built pyramid.
    #[must_use]
    pub const fn from_pyramid(pyramid: MipmapPyramid) -> Self {
        Self { pyramid }
    }

    /// The underlying pyramid.
    #[must_use]
    pub const fn pyramid(&self) -> &MipmapPyramid {
        &self.pyramid
    }

    /// Raster dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.pyramid.dimensions()
    }

    /// Number of pyramid levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.pyramid.depth()
    }

    /// Smallest finite sample, `None` if the raster holds no data.
    #[must_use]
    pub fn min(&self) -> Option<f64> {
        self.range().map(|(min, _)| min)
    }

    /// Largest finite sample, `None` if the raster holds no data.
    #[must_use]
    pub fn max(&self) -> Option<f64> {
        self.range().map(|(_, max)| max)
    }

    /// `(min, max)` of all finite samples.
    #[must_use]
    pub fn range(&self) -> Option<(f64, f64)> {
        self.pyramid.cell_range(0, 0, 0)
    }

    /// Ascending thresholds `k * step` with `min <= k * step < max`.
    ///
    /// Empty when the raster holds no data or is flat.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::InvalidArgument`] if `step` is not a
    /// positive finite number.
    pub fn intervals(&self, step: f64) -> Result<Vec<f64>, ContourError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(ContourError::InvalidArgument(format!(
                "interval step must be positive and finite, got {step}"
            )));
        }
        let Some((min, max)) = self.range() else {
            return Ok(Vec::new());
        };

        let mut thresholds = Vec::new();
        let mut k = (min / step).ceil();
        loop {
            let threshold = k * step;
            if threshold >= max {
                break;
            }
            // Rounding in `k * step` can land just under `min`.
            if threshold >= min {
                thresholds.push(threshold);
            }
            let next = k + 1.0;
            if next <= k {
                break;
            }
            k = next;
        }
        Ok(thresholds)
    }

    /// Walk the quadtree for `threshold`, reporting raw segments and
    /// leaves to `visitor` in per-level grid units.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::InvalidArgument`] if `threshold` is not
    /// finite.
    pub fn evaluate_contour<V>(
        &self,
        threshold: f64,
        max_level: Option<usize>,
        visitor: &mut V,
    ) -> Result<(), ContourError>
    where
        V: ContourVisitor + ?Sized,
    {
        Self::check_threshold(threshold)?;
        walker::evaluate_contour(&self.pyramid, threshold, max_level, visitor);
        Ok(())
    }

    /// Stitched contour lines in pixel coordinates, before filtering and
    /// smoothing. Rings come first.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::InvalidArgument`] for a non-finite
    /// threshold. Stitching errors indicate a walker defect and are
    /// propagated as is.
    pub fn trace(
        &self,
        threshold: f64,
        max_level: Option<usize>,
    ) -> Result<Vec<Polyline>, ContourError> {
        let mut collector = SegmentCollector::new(&self.pyramid);
        self.evaluate_contour(threshold, max_level, &mut collector)?;
        let segments = collector.into_segments();
        let stitched = stitch_segments(&segments)?;
        tracing::trace!(
            threshold,
            segments = segments.len(),
            rings = stitched.rings.len(),
            open = stitched.open.len(),
            "stitched contour"
        );
        Ok(stitched.into_polylines())
    }

    /// Contour lines at `threshold` in pixel coordinates.
    ///
    /// Runs the walk, stitching, the minimum-length filter, smoothing and
    /// optional simplification. Rings keep `first == last` exactly.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::InvalidArgument`] for a non-finite
    /// threshold or invalid options.
    pub fn contour(
        &self,
        threshold: f64,
        options: &ContourOptions,
    ) -> Result<Vec<Polyline>, ContourError> {
        self.contour_with_diagnostics(threshold, options, &NoClock)
            .map(|(lines, _)| lines)
    }

    /// Contours at every threshold of [`intervals`](Self::intervals).
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::InvalidArgument`] for an invalid `step` or
    /// invalid options.
    pub fn contours(
        &self,
        step: f64,
        options: &ContourOptions,
    ) -> Result<Vec<IsolineSet>, ContourError> {
        self.intervals(step)?
            .into_iter()
            .map(|threshold| {
                Ok(IsolineSet {
                    threshold,
                    lines: self.contour(threshold, options)?,
                })
            })
            .collect()
    }

    /// [`contour`](Self::contour) with per-stage timing and counts.
    ///
    /// # Errors
    ///
    /// Same as [`contour`](Self::contour).
    pub fn contour_with_diagnostics<C: Clock>(
        &self,
        threshold: f64,
        options: &ContourOptions,
        clock: &C,
    ) -> Result<(Vec<Polyline>, ContourDiagnostics), ContourError> {
        crate::diagnostics::contour_with_diagnostics(self, threshold, options, clock)
    }

    pub(crate) fn check_threshold(threshold: f64) -> Result<(), ContourError> {
        if threshold.is_finite() {
            Ok(())
        } else {
            Err(ContourError::InvalidArgument(format!(
                "threshold must be finite, got {threshold}"
            )))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::walker::{CellClass, FnVisitor, LeafTally};

    fn ramp(width: u32, height: u32) -> ContourMipmap {
        let raster: Vec<f64> = (0..height)
            .flat_map(|_| (0..width).map(f64::from))
            .collect();
        ContourMipmap::new(&raster, width, height).unwrap()
    }

    #[test]
    fn extrema_come_from_root() {
        let mipmap = ramp(5, 3);
        assert_eq!(mipmap.range(), Some((0.0, 4.0)));
        assert_eq!(mipmap.min(), Some(0.0));
        assert_eq!(mipmap.max(), Some(4.0));
        assert_eq!(mipmap.depth(), 4);
    }

    #[test]
    fn all_missing_has_no_range() {
        let mipmap = ContourMipmap::new(&[f64::NAN; 4], 2, 2).unwrap();
        assert_eq!(mipmap.range(), None);
        assert!(mipmap.intervals(1.0).unwrap().is_empty());
        assert!(mipmap.contour(0.0, &ContourOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn intervals_are_bounded() {
        let raster = [-3.7, 0.2, 5.5, 12.9];
        let mipmap = ContourMipmap::new(&raster, 2, 2).unwrap();
        let thresholds = mipmap.intervals(2.5).unwrap();
        assert_eq!(thresholds, vec![-2.5, 0.0, 2.5, 5.0, 7.5, 10.0, 12.5]);
        for t in thresholds {
            assert!(-3.7 <= t && t < 12.9);
        }
    }

    #[test]
    fn intervals_exclude_max() {
        let mipmap = ramp(5, 1);
        assert_eq!(mipmap.intervals(1.0).unwrap(), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn intervals_reject_bad_step() {
        let mipmap = ramp(4, 4);
        for step in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                mipmap.intervals(step),
                Err(ContourError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn flat_raster_has_no_intervals() {
        let mipmap = ContourMipmap::new(&[2.0; 9], 3, 3).unwrap();
        assert!(mipmap.intervals(0.5).unwrap().is_empty());
    }

    #[test]
    fn ramp_contour_is_one_open_line() {
        let mipmap = ramp(8, 8);
        let lines = mipmap.trace(3.5, None).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].is_ring());
        // Vertical border at x = 4, walked downward so the high side
        // (screen right) is on the left of the direction of travel.
        let points = lines[0].points();
        assert!(points.iter().all(|p| (p.x - 4.0).abs() < f64::EPSILON));
        assert_eq!(points.first(), Some(&crate::Point::new(4.0, 0.0)));
        assert_eq!(points.last(), Some(&crate::Point::new(4.0, 8.0)));
    }

    #[test]
    fn evaluate_contour_reports_grid_units() {
        let mipmap = ramp(8, 8);
        let mut levels = Vec::new();
        {
            let mut visitor = FnVisitor {
                on_line: |level: usize, x1: u32, _y1: u32, x2: u32, _y2: u32| {
                    levels.push((level, x1, x2));
                },
                on_leaf: |_: usize, _: u32, _: u32, _: CellClass| {},
            };
            mipmap.evaluate_contour(3.5, None, &mut visitor).unwrap();
        }
        // Segments at coarse levels are not scaled: x stays within that
        // level's width.
        assert!(!levels.is_empty());
        for (level, x1, x2) in levels {
            let width = mipmap.pyramid().level(level).unwrap().width();
            assert!(x1 <= width && x2 <= width);
        }
    }

    #[test]
    fn evaluate_contour_rejects_nan_threshold() {
        let mut tally = LeafTally::default();
        let result = ramp(4, 4).evaluate_contour(f64::NAN, None, &mut tally);
        assert!(matches!(result, Err(ContourError::InvalidArgument(_))));
        assert_eq!(tally.leaves(), 0);
    }

    #[test]
    fn contour_rejects_bad_options() {
        let options = ContourOptions {
            simplify_tolerance: f64::NAN,
            ..ContourOptions::default()
        };
        assert!(ramp(4, 4).contour(1.5, &options).is_err());
    }

    #[test]
    fn contours_follow_intervals() {
        let mipmap = ramp(6, 6);
        let options = ContourOptions {
            smooth_cycles: 0,
            ..ContourOptions::default()
        };
        let sets = mipmap.contours(2.0, &options).unwrap();
        let thresholds: Vec<f64> = sets.iter().map(|s| s.threshold).collect();
        assert_eq!(thresholds, vec![0.0, 2.0, 4.0]);
        // Threshold 0 is at the minimum: every sample is above.
        assert!(sets[0].lines.is_empty());
        assert_eq!(sets[1].lines.len(), 1);
        assert_eq!(sets[2].lines.len(), 1);
    }

    #[test]
    fn contour_matches_staged_run_across_options() {
        let raster: Vec<f64> = (0..24 * 20)
            .map(|i| {
                let (x, y) = (f64::from(i % 24), f64::from(i / 24));
                (x / 3.0).sin() * (y / 4.0).cos()
            })
            .collect();
        let mipmap = ContourMipmap::new(&raster, 24, 20).unwrap();
        let variants = [
            ContourOptions::default(),
            ContourOptions {
                smooth_cycles: 0,
                ..ContourOptions::default()
            },
            ContourOptions {
                simplify_tolerance: 0.3,
                min_points: 6,
                ..ContourOptions::default()
            },
            ContourOptions {
                max_level: Some(3),
                smooth_kernel_width: 1,
                ..ContourOptions::default()
            },
        ];
        for options in &variants {
            for threshold in mipmap.intervals(0.25).unwrap() {
                let (staged, diagnostics) = mipmap
                    .contour_with_diagnostics(threshold, options, &NoClock)
                    .unwrap();
                assert_eq!(mipmap.contour(threshold, options).unwrap(), staged);
                assert_eq!(diagnostics.summary.line_count, staged.len());
            }
        }
    }

    #[test]
    fn from_pyramid_shares_results() {
        let raster: Vec<f64> = (0..16).map(f64::from).collect();
        let pyramid = MipmapPyramid::build(&raster, Dimensions { width: 4, height: 4 }).unwrap();
        let a = ContourMipmap::from_pyramid(pyramid);
        let b = ContourMipmap::new(&raster, 4, 4).unwrap();
        let options = ContourOptions::default();
        assert_eq!(a.contour(7.5, &options).unwrap(), b.contour(7.5, &options).unwrap());
    }
}
