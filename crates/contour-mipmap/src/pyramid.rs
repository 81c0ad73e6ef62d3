//! Min/max mipmap pyramid over a scalar raster.
//!
//! The pyramid is built once from the raw samples by repeatedly halving
//! the grid (ceiling division) and aggregating each 2x2 block into its
//! minimum and maximum finite value. Levels are stored coarsest first:
//! level 0 is a single cell covering the whole raster, the last level is
//! the raster itself.
//!
//! Each cell also records whether its footprint is *complete*: fully
//! inside the raster and free of no-data samples. The quadtree walker
//! uses this to descend into partial cells instead of drawing borders
//! across gaps.
//!
//! Once built the pyramid is immutable, so it can be shared across any
//! number of threshold queries (including from several threads).

use crate::types::{ContourError, Dimensions};

/// Summary of one cell of a [`MipmapLevel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSummary {
    /// Smallest finite sample under the cell, `NaN` if there is none.
    pub min: f64,
    /// Largest finite sample under the cell, `NaN` if there is none.
    pub max: f64,
    /// `true` if the footprint lies inside the raster and holds no `NaN`.
    pub complete: bool,
}

impl CellSummary {
    /// Returns `true` if the footprint holds no finite sample at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.is_nan() || self.max.is_nan()
    }
}

/// One level of the pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct MipmapLevel {
    min: Vec<f64>,
    max: Vec<f64>,
    complete: Vec<bool>,
    width: u32,
    height: u32,
    scale: u32,
}

impl MipmapLevel {
    /// Width of this level in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of this level in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Edge length of one cell in finest-grid units.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.scale
    }

    /// Per-cell minima, row-major.
    #[must_use]
    pub fn min_values(&self) -> &[f64] {
        &self.min
    }

    /// Per-cell maxima, row-major.
    #[must_use]
    pub fn max_values(&self) -> &[f64] {
        &self.max
    }

    /// Look up a cell. Returns `None` outside the level's bounds.
    #[must_use]
    pub fn cell(&self, x: u32, y: u32) -> Option<CellSummary> {
        let idx = self.index(x, y)?;
        Some(CellSummary {
            min: self.min[idx],
            max: self.max[idx],
            complete: self.complete[idx],
        })
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let (x, y, w) = (x as usize, y as usize, self.width as usize);
        Some(y * w + x)
    }

    /// The raw raster as the finest level. Non-finite samples become
    /// `NaN` (no data).
    fn finest(raster: &[f64], dimensions: Dimensions) -> Self {
        let min: Vec<f64> = raster
            .iter()
            .map(|&v| if v.is_finite() { v } else { f64::NAN })
            .collect();
        let complete = min.iter().map(|v| !v.is_nan()).collect();
        Self {
            max: min.clone(),
            min,
            complete,
            width: dimensions.width,
            height: dimensions.height,
            scale: 1,
        }
    }

    /// Aggregate 2x2 blocks of `self` into the next coarser level.
    ///
    /// Blocks on the right or bottom edge of an odd-sized level have only
    /// one or two members; the missing members lie outside the raster, so
    /// the output cell is marked incomplete.
    fn reduce(&self) -> Self {
        let width = self.width.div_ceil(2);
        let height = self.height.div_ceil(2);
        let len = width as usize * height as usize;
        let mut min = Vec::with_capacity(len);
        let mut max = Vec::with_capacity(len);
        let mut complete = Vec::with_capacity(len);

        for y in 0..height {
            for x in 0..width {
                let mut lo = f64::NAN;
                let mut hi = f64::NAN;
                let mut all_complete = true;
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    match self.cell(2 * x + dx, 2 * y + dy) {
                        Some(child) => {
                            // f64::min/max return the other operand when one is NaN.
                            lo = lo.min(child.min);
                            hi = hi.max(child.max);
                            all_complete &= child.complete;
                        }
                        None => all_complete = false,
                    }
                }
                min.push(lo);
                max.push(hi);
                complete.push(all_complete);
            }
        }

        Self {
            min,
            max,
            complete,
            width,
            height,
            scale: self.scale * 2,
        }
    }
}

/// Ordered hierarchy of min/max summaries, coarsest to finest.
#[derive(Debug, Clone, PartialEq)]
pub struct MipmapPyramid {
    levels: Vec<MipmapLevel>,
    dimensions: Dimensions,
}

impl MipmapPyramid {
    /// Build the pyramid for a row-major raster.
    ///
    /// `NaN` (and any other non-finite value) marks a missing sample.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::EmptyRaster`] if either dimension is zero,
    /// and [`ContourError::DimensionMismatch`] if `raster.len()` is not
    /// `width * height`.
    pub fn build(raster: &[f64], dimensions: Dimensions) -> Result<Self, ContourError> {
        if dimensions.width == 0 || dimensions.height == 0 {
            return Err(ContourError::EmptyRaster {
                width: dimensions.width,
                height: dimensions.height,
            });
        }
        let expected = dimensions.sample_count().unwrap_or(usize::MAX);
        if raster.len() != expected {
            return Err(ContourError::DimensionMismatch {
                expected,
                actual: raster.len(),
            });
        }

        let mut levels = vec![MipmapLevel::finest(raster, dimensions)];
        while let Some(last) = levels.last()
            && (last.width > 1 || last.height > 1)
        {
            let coarser = last.reduce();
            levels.push(coarser);
        }
        levels.reverse();

        tracing::trace!(
            width = dimensions.width,
            height = dimensions.height,
            depth = levels.len(),
            "built mipmap pyramid"
        );

        Ok(Self { levels, dimensions })
    }

    /// Number of levels (`ceil(log2(max(width, height))) + 1`).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Dimensions of the source raster.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// All levels, coarsest first.
    #[must_use]
    pub fn levels(&self) -> &[MipmapLevel] {
        &self.levels
    }

    /// Level `index`, where 0 is the 1x1 root.
    #[must_use]
    pub fn level(&self, index: usize) -> Option<&MipmapLevel> {
        self.levels.get(index)
    }

    /// The 1x1 root level.
    #[must_use]
    pub fn root(&self) -> &MipmapLevel {
        // `build` always pushes at least the finest level.
        &self.levels[0]
    }

    /// Look up a cell on a given level.
    #[must_use]
    pub fn cell(&self, level: usize, x: u32, y: u32) -> Option<CellSummary> {
        self.level(level)?.cell(x, y)
    }

    /// Finite `(min, max)` range of a cell, `None` if the cell is out of
    /// bounds or holds no data.
    #[must_use]
    pub fn cell_range(&self, level: usize, x: u32, y: u32) -> Option<(f64, f64)> {
        let cell = self.cell(level, x, y)?;
        (!cell.is_empty()).then_some((cell.min, cell.max))
    }
}
