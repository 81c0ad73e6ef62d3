//! Segment stitching: join unordered oriented segments into maximal
//! polylines and closed rings by exact endpoint matching.
//!
//! Two maps track the open fragments: one keyed by the point where a
//! fragment starts, one keyed by the point where it ends. Each incoming
//! segment `(s, e)` either closes a fragment into a ring, bridges two
//! fragments, extends one at either end, or starts a new fragment.
//!
//! # Saddles
//!
//! Where four cells meet in a checkerboard, two fragments end and two
//! start at the same grid point. Keys at such points additionally carry
//! the corner quadrant of the above-threshold cell on the segment's
//! left. An incoming end and an outgoing start share that quadrant only
//! when the path turns toward the above region, so above-threshold areas
//! that touch diagonally are kept apart.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::{ContourError, GridPoint, Point, Polyline, Segment};

/// Exact identity of a fragment endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EndpointKey {
    point: GridPoint,
    /// Quadrant `(sx, sy)` of the above cell touching `point`, only set
    /// at saddle points.
    corner: Option<(i8, i8)>,
}

/// A partially assembled open polyline.
#[derive(Debug)]
struct Fragment {
    points: VecDeque<GridPoint>,
    head: EndpointKey,
    tail: EndpointKey,
}

/// Stitched output in finest-grid coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stitched {
    /// Closed rings, each with `first == last`.
    pub rings: Vec<Vec<GridPoint>>,
    /// Open polylines ending at raster edges or no-data boundaries.
    pub open: Vec<Vec<GridPoint>>,
}

impl Stitched {
    /// Total number of lines (rings plus open polylines).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rings.len() + self.open.len()
    }

    /// Returns `true` if nothing was stitched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty() && self.open.is_empty()
    }

    /// Convert to pixel-space polylines, rings first.
    #[must_use]
    pub fn into_polylines(self) -> Vec<Polyline> {
        self.rings
            .into_iter()
            .chain(self.open)
            .map(|line| {
                let points: Vec<Point> = line.into_iter().map(GridPoint::to_point).collect();
                Polyline::new(points)
            })
            .collect()
    }
}

/// Incremental endpoint-matching stitcher.
#[derive(Debug, Default)]
pub struct SegmentStitcher {
    fragments: Vec<Option<Fragment>>,
    open_start: HashMap<EndpointKey, usize>,
    open_end: HashMap<EndpointKey, usize>,
    rings: Vec<Vec<GridPoint>>,
    saddles: HashSet<GridPoint>,
}

impl SegmentStitcher {
    /// Create a stitcher with no saddle points.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stitcher that disambiguates the given saddle points.
    ///
    /// Use [`find_saddles`] on the full segment list to obtain them.
    #[must_use]
    pub fn with_saddles(saddles: HashSet<GridPoint>) -> Self {
        Self {
            saddles,
            ..Self::default()
        }
    }

    /// Number of registered `(starts, ends)` of open fragments.
    #[must_use]
    pub fn open_counts(&self) -> (usize, usize) {
        (self.open_start.len(), self.open_end.len())
    }

    /// Add one segment.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::DegenerateSegment`] for a zero-length
    /// segment, [`ContourError::DuplicateEndpoint`] if two open fragments
    /// would claim the same endpoint, and [`ContourError::StitchInvariant`]
    /// if the start and end maps ever disagree in size. Any of these
    /// means the segment input is malformed.
    pub fn push(&mut self, segment: Segment) -> Result<(), ContourError> {
        if segment.is_degenerate() {
            return Err(ContourError::DegenerateSegment {
                x: segment.start.x,
                y: segment.start.y,
            });
        }
        let start_key = self.outgoing_key(&segment);
        let end_key = self.incoming_key(&segment);

        let a = self.open_end.get(&start_key).copied();
        let b = self.open_start.get(&end_key).copied();

        match (a, b) {
            (Some(a), Some(b)) if a == b => {
                self.open_end.remove(&start_key);
                self.open_start.remove(&end_key);
                if let Some(mut fragment) = self.fragments[a].take() {
                    fragment.points.push_back(segment.end);
                    self.rings.push(fragment.points.into());
                }
            }
            (Some(a), Some(b)) => {
                self.open_end.remove(&start_key);
                self.open_start.remove(&end_key);
                if let Some(tail) = self.fragments[b].take() {
                    self.open_end.remove(&tail.tail);
                    self.open_end.insert(tail.tail, a);
                    if let Some(head) = self.fragments[a].as_mut() {
                        head.points.extend(tail.points);
                        head.tail = tail.tail;
                    }
                }
            }
            (Some(a), None) => {
                self.open_end.remove(&start_key);
                if let Some(fragment) = self.fragments[a].as_mut() {
                    fragment.points.push_back(segment.end);
                    fragment.tail = end_key;
                }
                register(&mut self.open_end, end_key, a)?;
            }
            (None, Some(b)) => {
                self.open_start.remove(&end_key);
                if let Some(fragment) = self.fragments[b].as_mut() {
                    fragment.points.push_front(segment.start);
                    fragment.head = start_key;
                }
                register(&mut self.open_start, start_key, b)?;
            }
            (None, None) => {
                let id = self.fragments.len();
                self.fragments.push(Some(Fragment {
                    points: VecDeque::from([segment.start, segment.end]),
                    head: start_key,
                    tail: end_key,
                }));
                register(&mut self.open_start, start_key, id)?;
                register(&mut self.open_end, end_key, id)?;
            }
        }

        let (starts, ends) = self.open_counts();
        if starts != ends {
            return Err(ContourError::StitchInvariant { starts, ends });
        }
        Ok(())
    }

    /// Finish stitching: closed rings in closing order, then the
    /// remaining open fragments in creation order.
    #[must_use]
    pub fn finish(self) -> Stitched {
        let open = self
            .fragments
            .into_iter()
            .flatten()
            .map(|f| f.points.into())
            .collect();
        Stitched {
            rings: self.rings,
            open,
        }
    }

    /// Key of `segment.start` as seen by a fragment that continues into
    /// the segment (above cell ahead-left of the start).
    fn outgoing_key(&self, segment: &Segment) -> EndpointKey {
        let (dx, dy) = segment.step();
        let corner = self
            .saddles
            .contains(&segment.start)
            .then_some((dy + dx, -dx + dy));
        EndpointKey {
            point: segment.start,
            corner,
        }
    }

    /// Key of `segment.end` as seen by a fragment that the segment
    /// continues (above cell behind-left of the end).
    fn incoming_key(&self, segment: &Segment) -> EndpointKey {
        let (dx, dy) = segment.step();
        let corner = self
            .saddles
            .contains(&segment.end)
            .then_some((dy - dx, -dx - dy));
        EndpointKey {
            point: segment.end,
            corner,
        }
    }
}

fn register(
    map: &mut HashMap<EndpointKey, usize>,
    key: EndpointKey,
    id: usize,
) -> Result<(), ContourError> {
    if map.insert(key, id).is_some() {
        return Err(ContourError::DuplicateEndpoint {
            x: key.point.x,
            y: key.point.y,
        });
    }
    Ok(())
}

/// Grid points where two or more segments end (checkerboard corners).
#[must_use]
pub fn find_saddles(segments: &[Segment]) -> HashSet<GridPoint> {
    let mut arrivals: HashMap<GridPoint, u8> = HashMap::new();
    for segment in segments {
        let count = arrivals.entry(segment.end).or_insert(0);
        *count = count.saturating_add(1);
    }
    arrivals
        .into_iter()
        .filter(|&(_, n)| n >= 2)
        .map(|(p, _)| p)
        .collect()
}

/// Stitch a complete segment list.
///
/// # Errors
///
/// Propagates any error from [`SegmentStitcher::push`].
pub fn stitch_segments(segments: &[Segment]) -> Result<Stitched, ContourError> {
    let mut stitcher = SegmentStitcher::with_saddles(find_saddles(segments));
    for &segment in segments {
        stitcher.push(segment)?;
    }
    Ok(stitcher.finish())
}
