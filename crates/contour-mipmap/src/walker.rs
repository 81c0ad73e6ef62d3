//! Adaptive quadtree traversal of a [`MipmapPyramid`] for one threshold.
//!
//! The walk starts at the 1x1 root. A cell whose value range straddles
//! the threshold is subdivided into its four children, after which the
//! four borders *between* those children are examined. A border whose
//! two sides are above and below the threshold yields one oriented
//! segment; a border touching a straddling cell is split into the two
//! finer borders that replace it one level down. The outer borders of a
//! node are never examined by the node itself: they belong to whichever
//! ancestor owns the edge between this node and its neighbour.
//!
//! Uniform regions therefore end at a single coarse leaf and the cost of
//! a walk follows the length of the contour, not the size of the raster.
//!
//! Results are reported through a [`ContourVisitor`] in per-level grid
//! units; [`SegmentCollector`] rescales them to the finest grid.

use serde::{Deserialize, Serialize};

use crate::pyramid::{MipmapLevel, MipmapPyramid};
use crate::types::{GridPoint, Segment};

/// Classification of a pyramid cell against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellClass {
    /// Out of bounds, or the footprint holds no finite sample.
    Outside,
    /// Every sample is at or above the threshold.
    Above,
    /// Every sample is below the threshold.
    Below,
    /// The cell straddles the threshold (or mixes data with no-data) and
    /// must be subdivided.
    Within,
}

/// Receives the output of a walk.
///
/// Coordinates are in grid units of the reported `level`; multiply by
/// that level's [`scale`](crate::pyramid::MipmapLevel::scale) to obtain
/// finest-grid coordinates.
pub trait ContourVisitor {
    /// Called once per emitted segment, running from `(x1, y1)` to
    /// `(x2, y2)` with the above-threshold side on its left.
    fn visit_line(&mut self, level: usize, x1: u32, y1: u32, x2: u32, y2: u32);

    /// Called once per terminal (non-subdivided) cell.
    fn visit_leaf(&mut self, level: usize, x: u32, y: u32, class: CellClass) {
        let _ = (level, x, y, class);
    }
}

/// Adapts a pair of closures to [`ContourVisitor`].
pub struct FnVisitor<L, F> {
    /// Segment callback.
    pub on_line: L,
    /// Leaf callback.
    pub on_leaf: F,
}

impl<L, F> ContourVisitor for FnVisitor<L, F>
where
    L: FnMut(usize, u32, u32, u32, u32),
    F: FnMut(usize, u32, u32, CellClass),
{
    fn visit_line(&mut self, level: usize, x1: u32, y1: u32, x2: u32, y2: u32) {
        (self.on_line)(level, x1, y1, x2, y2);
    }

    fn visit_leaf(&mut self, level: usize, x: u32, y: u32, class: CellClass) {
        (self.on_leaf)(level, x, y, class);
    }
}

/// Walk the pyramid for `threshold`, reporting segments and leaves.
///
/// `max_level` caps the traversal depth. Cells at or below that level
/// that still straddle the threshold are classified [`CellClass::Above`]
/// instead of being subdivided, which gives a fixed-resolution view of
/// the contour. `None` walks the full pyramid.
pub fn evaluate_contour<V>(
    pyramid: &MipmapPyramid,
    threshold: f64,
    max_level: Option<usize>,
    visitor: &mut V,
) where
    V: ContourVisitor + ?Sized,
{
    let depth = pyramid.depth();
    let mut walker = Walker {
        pyramid,
        threshold,
        limit: max_level.map_or(depth, |m| m.min(depth)),
        visitor,
    };
    walker.visit_node(0, 0, 0);
}

struct Walker<'a, V: ?Sized> {
    pyramid: &'a MipmapPyramid,
    threshold: f64,
    limit: usize,
    visitor: &'a mut V,
}

impl<V: ContourVisitor + ?Sized> Walker<'_, V> {
    fn classify(&self, level: usize, x: u32, y: u32) -> CellClass {
        let Some(cell) = self.pyramid.cell(level, x, y) else {
            return CellClass::Outside;
        };
        if cell.is_empty() {
            return CellClass::Outside;
        }
        let above = cell.min >= self.threshold;
        let below = cell.max < self.threshold;
        if level >= self.limit {
            // Forced approximation: anything not fully below counts as above.
            return if below {
                CellClass::Below
            } else {
                CellClass::Above
            };
        }
        if !cell.complete {
            return CellClass::Within;
        }
        if above {
            CellClass::Above
        } else if below {
            CellClass::Below
        } else {
            CellClass::Within
        }
    }

    fn visit_node(&mut self, level: usize, x: u32, y: u32) {
        let class = self.classify(level, x, y);
        if class != CellClass::Within {
            self.visitor.visit_leaf(level, x, y, class);
            return;
        }

        let (child, cx, cy) = (level + 1, 2 * x, 2 * y);
        self.visit_node(child, cx, cy);
        self.visit_node(child, cx + 1, cy);
        self.visit_node(child, cx, cy + 1);
        self.visit_node(child, cx + 1, cy + 1);

        // The four borders shared between the children.
        self.visit_side_by_side(child, cx, cy);
        self.visit_side_by_side(child, cx, cy + 1);
        self.visit_stacked(child, cx, cy);
        self.visit_stacked(child, cx + 1, cy);
    }

    /// Border between `(x, y)` and its right-hand neighbour `(x + 1, y)`.
    fn visit_side_by_side(&mut self, level: usize, x: u32, y: u32) {
        let left = self.classify(level, x, y);
        let right = self.classify(level, x + 1, y);
        match (left, right) {
            (CellClass::Outside, _) | (_, CellClass::Outside) => {}
            (CellClass::Within, _) | (_, CellClass::Within) => {
                let (child, cx, cy) = (level + 1, 2 * x + 1, 2 * y);
                self.visit_side_by_side(child, cx, cy);
                self.visit_side_by_side(child, cx, cy + 1);
            }
            // Above on the left: walk up the shared border.
            (CellClass::Above, CellClass::Below) => {
                self.visitor.visit_line(level, x + 1, y + 1, x + 1, y);
            }
            (CellClass::Below, CellClass::Above) => {
                self.visitor.visit_line(level, x + 1, y, x + 1, y + 1);
            }
            _ => {}
        }
    }

    /// Border between `(x, y)` and the neighbour below it, `(x, y + 1)`.
    fn visit_stacked(&mut self, level: usize, x: u32, y: u32) {
        let top = self.classify(level, x, y);
        let bottom = self.classify(level, x, y + 1);
        match (top, bottom) {
            (CellClass::Outside, _) | (_, CellClass::Outside) => {}
            (CellClass::Within, _) | (_, CellClass::Within) => {
                let (child, cx, cy) = (level + 1, 2 * x, 2 * y + 1);
                self.visit_stacked(child, cx, cy);
                self.visit_stacked(child, cx + 1, cy);
            }
            // Above on top: walk right along the shared border.
            (CellClass::Above, CellClass::Below) => {
                self.visitor.visit_line(level, x, y + 1, x + 1, y + 1);
            }
            (CellClass::Below, CellClass::Above) => {
                self.visitor.visit_line(level, x + 1, y + 1, x, y + 1);
            }
            _ => {}
        }
    }
}

/// Visitor that gathers segments scaled to finest-grid units.
#[derive(Debug, Clone)]
pub struct SegmentCollector {
    scales: Vec<u32>,
    segments: Vec<Segment>,
}

impl SegmentCollector {
    /// Create a collector for walks over `pyramid`.
    #[must_use]
    pub fn new(pyramid: &MipmapPyramid) -> Self {
        Self {
            scales: pyramid.levels().iter().map(MipmapLevel::scale).collect(),
            segments: Vec::new(),
        }
    }

    /// Segments gathered so far.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Consume the collector and return its segments.
    #[must_use]
    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }
}

impl ContourVisitor for SegmentCollector {
    fn visit_line(&mut self, level: usize, x1: u32, y1: u32, x2: u32, y2: u32) {
        let s = self.scales.get(level).copied().unwrap_or(1);
        self.segments.push(Segment::new(
            GridPoint::new(x1 * s, y1 * s),
            GridPoint::new(x2 * s, y2 * s),
        ));
    }
}

/// Counts of leaves per classification and of emitted segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafTally {
    /// Leaves classified [`CellClass::Outside`].
    pub outside: usize,
    /// Leaves classified [`CellClass::Above`].
    pub above: usize,
    /// Leaves classified [`CellClass::Below`].
    pub below: usize,
    /// Segments emitted.
    pub lines: usize,
    /// Deepest level at which a leaf was reported.
    pub deepest_level: usize,
}

impl LeafTally {
    /// Total number of leaves.
    #[must_use]
    pub const fn leaves(&self) -> usize {
        self.outside + self.above + self.below
    }
}

impl ContourVisitor for LeafTally {
    fn visit_line(&mut self, _level: usize, _x1: u32, _y1: u32, _x2: u32, _y2: u32) {
        self.lines += 1;
    }

    fn visit_leaf(&mut self, level: usize, _x: u32, _y: u32, class: CellClass) {
        match class {
            CellClass::Outside => self.outside += 1,
            CellClass::Above => self.above += 1,
            CellClass::Below => self.below += 1,
            CellClass::Within => {}
        }
        self.deepest_level = self.deepest_level.max(level);
    }
}

/// Forwards every callback to two visitors in turn.
pub struct Tee<'a, A: ?Sized, B: ?Sized>(pub &'a mut A, pub &'a mut B);

impl<A, B> ContourVisitor for Tee<'_, A, B>
where
    A: ContourVisitor + ?Sized,
    B: ContourVisitor + ?Sized,
{
    fn visit_line(&mut self, level: usize, x1: u32, y1: u32, x2: u32, y2: u32) {
        self.0.visit_line(level, x1, y1, x2, y2);
        self.1.visit_line(level, x1, y1, x2, y2);
    }

    fn visit_leaf(&mut self, level: usize, x: u32, y: u32, class: CellClass) {
        self.0.visit_leaf(level, x, y, class);
        self.1.visit_leaf(level, x, y, class);
    }
}
