//! contour-mipmap: iso-line extraction from rasters through a min/max
//! pyramid (sans-IO).
//!
//! Converts a scalar raster into contour polylines through:
//! mipmap pyramid -> quadtree walk -> segment stitching ->
//! length filter -> smoothing -> optional simplification.
//!
//! The pyramid is built once per raster and is read-only afterwards, so
//! any number of thresholds can be contoured against it, from any
//! number of threads. Uniform regions are skipped at coarse levels,
//! which keeps the cost of a contour proportional to its length.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! sample slices and returns structured data. Raster decoding and
//! output serialization belong to the caller.

pub mod diagnostics;
pub mod mipmap;
pub mod pyramid;
pub mod simplify;
pub mod smooth;
pub mod stitch;
pub mod types;
pub mod walker;

pub use diagnostics::{Clock, ContourDiagnostics, NoClock};
pub use mipmap::{ContourMipmap, IsolineSet};
pub use pyramid::{CellSummary, MipmapLevel, MipmapPyramid};
pub use stitch::{SegmentStitcher, Stitched};
pub use types::{
    ContourError, ContourOptions, Dimensions, GridPoint, Point, Polyline, Segment, WindingOrder,
};
pub use walker::{CellClass, ContourVisitor, FnVisitor};
