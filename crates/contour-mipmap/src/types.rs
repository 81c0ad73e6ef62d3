//! Shared types for the contour pipeline.

use geo::{Area, Winding};
use serde::{Deserialize, Serialize};

/// Re-export so downstream crates can name the orientation returned by
/// [`Polyline::winding_order`] without depending on `geo` directly.
pub use geo::winding_order::WindingOrder;

/// A 2D point in raster pixel coordinates.
///
/// The origin is the top-left corner of the raster, `x` grows to the
/// right and `y` grows downward. One unit is one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// An integer corner of the finest raster grid.
///
/// Before smoothing every contour vertex sits on a pixel corner, so
/// endpoint identity can be compared exactly. The pair is used directly
/// as a map key; no packing into a single integer is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPoint {
    /// Column of the corner (`0..=width`).
    pub x: u32,
    /// Row of the corner (`0..=height`).
    pub y: u32,
}

impl GridPoint {
    /// Create a new grid point.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Convert to a floating-point pixel coordinate.
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }
}

/// An oriented contour segment in finest-grid units.
///
/// Segments run so that the above-threshold region lies on their left
/// (with `y` pointing down, "left" is the visual left when walking from
/// `start` to `end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    /// First endpoint.
    pub start: GridPoint,
    /// Second endpoint.
    pub end: GridPoint,
}

impl Segment {
    /// Create a new segment.
    #[must_use]
    pub const fn new(start: GridPoint, end: GridPoint) -> Self {
        Self { start, end }
    }

    /// Returns `true` if both endpoints coincide.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }

    /// Unit step `(dx, dy)` along the segment, each component in `-1..=1`.
    #[must_use]
    pub fn step(&self) -> (i8, i8) {
        (
            axis_step(self.start.x, self.end.x),
            axis_step(self.start.y, self.end.y),
        )
    }
}

fn axis_step(from: u32, to: u32) -> i8 {
    match from.cmp(&to) {
        std::cmp::Ordering::Less => 1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => -1,
    }
}

/// A sequence of connected points forming an iso-line.
///
/// A polyline whose first and last points are identical is a ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Returns `true` if the polyline is closed: at least four points
    /// (a triangle plus the repeated start) and `first == last` exactly.
    #[must_use]
    pub fn is_ring(&self) -> bool {
        self.0.len() >= 4 && self.0.first() == self.0.last()
    }

    /// Shoelace area of a ring in raw coordinates.
    ///
    /// Because `y` points down, rings that run counterclockwise on screen
    /// (the orientation the walker produces around peaks) have a negative
    /// value here. Open polylines return `0.0`.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        if !self.is_ring() {
            return 0.0;
        }
        geo::Polygon::new(self.to_line_string(), Vec::new()).signed_area()
    }

    /// Convert to a `geo` line string (same coordinates, `y` still down).
    #[must_use]
    pub fn to_line_string(&self) -> geo::LineString<f64> {
        self.0
            .iter()
            .map(|p| geo::Coord { x: p.x, y: p.y })
            .collect()
    }

    /// Winding order of a ring as `geo` computes it in raw coordinates.
    ///
    /// `geo` assumes `y` grows upward, so a ring that is counterclockwise
    /// on screen reports [`WindingOrder::Clockwise`]. Returns `None` for
    /// open or degenerate polylines.
    #[must_use]
    pub fn winding_order(&self) -> Option<WindingOrder> {
        if !self.is_ring() {
            return None;
        }
        self.to_line_string().winding_order()
    }
}

/// Raster dimensions in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in samples.
    pub width: u32,
    /// Height in samples.
    pub height: u32,
}

impl Dimensions {
    /// Total number of samples, or `None` if it does not fit in `usize`.
    #[must_use]
    pub fn sample_count(self) -> Option<usize> {
        let w = usize::try_from(self.width).ok()?;
        let h = usize::try_from(self.height).ok()?;
        w.checked_mul(h)
    }
}

/// Options for a single [`contour`](crate::ContourMipmap::contour) call.
///
/// Every default is declared once as an associated constant so the CLI
/// and library cannot drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourOptions {
    /// Deepest pyramid level the walker may descend to. Straddling cells
    /// at this level are treated as above-threshold. `None` uses the full
    /// pyramid depth, i.e. exact per-pixel contours.
    pub max_level: Option<usize>,

    /// Half-width of the box filter used for smoothing, in points.
    pub smooth_kernel_width: usize,

    /// Number of box filter passes. Zero disables smoothing.
    pub smooth_cycles: usize,

    /// Lines with fewer points than `max(min_points, 2 * smooth_kernel_width)`
    /// are dropped before smoothing.
    pub min_points: usize,

    /// Ramer-Douglas-Peucker tolerance in pixels applied after smoothing.
    /// `0.0` disables simplification.
    pub simplify_tolerance: f64,
}

impl ContourOptions {
    /// Default box filter half-width.
    pub const DEFAULT_SMOOTH_KERNEL_WIDTH: usize = 2;
    /// Default number of smoothing passes.
    pub const DEFAULT_SMOOTH_CYCLES: usize = 2;
    /// Default minimum point count.
    pub const DEFAULT_MIN_POINTS: usize = 0;
    /// Default simplification tolerance (disabled).
    pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 0.0;

    /// Smallest point count a line must have to survive the length filter.
    #[must_use]
    pub fn min_line_points(&self) -> usize {
        self.min_points
            .max(self.smooth_kernel_width.saturating_mul(2))
    }

    /// Check the option values.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::InvalidArgument`] if `simplify_tolerance`
    /// is negative or not finite.
    pub fn validate(&self) -> Result<(), ContourError> {
        if !self.simplify_tolerance.is_finite() || self.simplify_tolerance < 0.0 {
            return Err(ContourError::InvalidArgument(format!(
                "simplify_tolerance must be finite and non-negative, got {}",
                self.simplify_tolerance
            )));
        }
        Ok(())
    }
}

impl Default for ContourOptions {
    fn default() -> Self {
        Self {
            max_level: None,
            smooth_kernel_width: Self::DEFAULT_SMOOTH_KERNEL_WIDTH,
            smooth_cycles: Self::DEFAULT_SMOOTH_CYCLES,
            min_points: Self::DEFAULT_MIN_POINTS,
            simplify_tolerance: Self::DEFAULT_SIMPLIFY_TOLERANCE,
        }
    }
}

/// Errors that can occur while building a pyramid or extracting contours.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContourError {
    /// The raster has a zero dimension.
    #[error("raster must not be empty (got {width}x{height})")]
    EmptyRaster {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// The sample buffer does not match `width * height`.
    #[error("raster has {actual} samples, expected {expected}")]
    DimensionMismatch {
        /// `width * height` (saturated on overflow).
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },

    /// An argument is out of its accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A zero-length segment reached the stitcher.
    #[error("degenerate segment at ({x}, {y})")]
    DegenerateSegment {
        /// Column of the collapsed segment.
        x: u32,
        /// Row of the collapsed segment.
        y: u32,
    },

    /// Two open fragments claimed the same endpoint.
    #[error("endpoint ({x}, {y}) registered twice; segment input is duplicated or overlapping")]
    DuplicateEndpoint {
        /// Column of the contested endpoint.
        x: u32,
        /// Row of the contested endpoint.
        y: u32,
    },

    /// The open-start and open-end maps disagree in size.
    #[error("stitcher invariant violated: {starts} open starts vs {ends} open ends")]
    StitchInvariant {
        /// Number of registered fragment starts.
        starts: usize,
        /// Number of registered fragment ends.
        ends: usize,
    },
}

/// Serde-compatible proxy for `ContourError`, flattened to tagged
/// variants so diagnostics output can embed failures.
#[derive(Serialize, Deserialize)]
enum ContourErrorProxy {
    EmptyRaster { width: u32, height: u32 },
    DimensionMismatch { expected: usize, actual: usize },
    InvalidArgument(String),
    DegenerateSegment { x: u32, y: u32 },
    DuplicateEndpoint { x: u32, y: u32 },
    StitchInvariant { starts: usize, ends: usize },
}

impl Serialize for ContourError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::EmptyRaster { width, height } => ContourErrorProxy::EmptyRaster {
                width: *width,
                height: *height,
            },
            Self::DimensionMismatch { expected, actual } => ContourErrorProxy::DimensionMismatch {
                expected: *expected,
                actual: *actual,
            },
            Self::InvalidArgument(s) => ContourErrorProxy::InvalidArgument(s.clone()),
            Self::DegenerateSegment { x, y } => {
                ContourErrorProxy::DegenerateSegment { x: *x, y: *y }
            }
            Self::DuplicateEndpoint { x, y } => {
                ContourErrorProxy::DuplicateEndpoint { x: *x, y: *y }
            }
            Self::StitchInvariant { starts, ends } => ContourErrorProxy::StitchInvariant {
                starts: *starts,
                ends: *ends,
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContourError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = ContourErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            ContourErrorProxy::EmptyRaster { width, height } => Self::EmptyRaster { width, height },
            ContourErrorProxy::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            ContourErrorProxy::InvalidArgument(s) => Self::InvalidArgument(s),
            ContourErrorProxy::DegenerateSegment { x, y } => Self::DegenerateSegment { x, y },
            ContourErrorProxy::DuplicateEndpoint { x, y } => Self::DuplicateEndpoint { x, y },
            ContourErrorProxy::StitchInvariant { starts, ends } => {
                Self::StitchInvariant { starts, ends }
            }
        })
    }
}
