//! Iteration space of a computation.
//!
//! A [`Grid`] couples a topology provider with the horizontal boxes stages
//! iterate over and the vertical intervals they sweep. Each horizontal axis is
//! described by an [`AxisBox`]: the whole axis `[halo_start, halo_end)` and
//! the interior `[interior_start, interior_end)` that is actually computed.
//! Points between the two are halo: they may be read by neighbor accesses
//! but are never written.
//!
//! Boxes can be overridden per `(location, color)`, which lets a stage on
//! e.g. the third edge color stop one row earlier than the other colors.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use crate::debug_invariants::DebugInvariants;
use crate::stencil::schedule::ExecutionOrder;
use crate::stencil_error::StencilError;
use crate::topology::location::LocationType;
use crate::topology::point::GridPoint;
use crate::topology::{MeshDims, Topology};

/// Interior and halo bounds along one horizontal axis (half-open).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AxisBox {
    halo_start: usize,
    interior_start: usize,
    interior_end: usize,
    halo_end: usize,
}

impl AxisBox {
    /// # Errors
    /// `InvalidBox` unless `halo_start <= interior_start <= interior_end <= halo_end`.
    pub fn new(
        halo_start: usize,
        interior_start: usize,
        interior_end: usize,
        halo_end: usize,
    ) -> Result<Self, StencilError> {
        let b = Self {
            halo_start,
            interior_start,
            interior_end,
            halo_end,
        };
        b.validate_invariants()?;
        Ok(b)
    }

    /// Axis of length `len` with `halo` points excluded at both ends.
    ///
    /// An axis shorter than two halos gets an empty interior.
    pub fn with_halo(len: usize, halo: usize) -> Self {
        let interior_start = halo.min(len);
        let interior_end = len.saturating_sub(halo).max(interior_start);
        Self {
            halo_start: 0,
            interior_start,
            interior_end,
            halo_end: len,
        }
    }

    #[inline]
    pub fn interior(&self) -> Range<usize> {
        self.interior_start..self.interior_end
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.interior_start == self.interior_end
    }

    /// Points available before the interior.
    #[inline]
    pub fn halo_minus(&self) -> usize {
        self.interior_start - self.halo_start
    }

    /// Points available after the interior.
    #[inline]
    pub fn halo_plus(&self) -> usize {
        self.halo_end - self.interior_end
    }

    #[inline]
    pub fn halo_end(&self) -> usize {
        self.halo_end
    }

    fn bounds(&self) -> [usize; 4] {
        [
            self.halo_start,
            self.interior_start,
            self.interior_end,
            self.halo_end,
        ]
    }
}

impl DebugInvariants for AxisBox {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "AxisBox");
    }

    fn validate_invariants(&self) -> Result<(), StencilError> {
        let [a, b, c, d] = self.bounds();
        if a <= b && b <= c && c <= d {
            Ok(())
        } else {
            Err(StencilError::InvalidBox {
                bounds: self.bounds(),
                len: d,
            })
        }
    }
}

/// Boxes along both horizontal axes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HorizontalBox {
    pub i: AxisBox,
    pub j: AxisBox,
}

impl HorizontalBox {
    pub fn new(i: AxisBox, j: AxisBox) -> Self {
        Self { i, j }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.i.is_empty() || self.j.is_empty()
    }

    #[inline]
    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.i.interior().contains(&i) && self.j.interior().contains(&j)
    }

    /// Whether any side has halo points.
    pub fn has_halo(&self) -> bool {
        self.i.halo_minus() + self.i.halo_plus() + self.j.halo_minus() + self.j.halo_plus() > 0
    }
}

/// Inclusive range of vertical levels `[start, end]`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LevelInterval {
    start: usize,
    end: usize,
}

impl LevelInterval {
    /// # Errors
    /// `MalformedInterval` if `start > end`.
    pub fn new(start: usize, end: usize) -> Result<Self, StencilError> {
        if start > end {
            return Err(StencilError::MalformedInterval { start, end });
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Never true; an interval holds at least one level.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn contains(&self, k: usize) -> bool {
        self.start <= k && k <= self.end
    }

    fn overlaps(&self, other: &LevelInterval) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// One step of a vertical sweep: the interval it belongs to and the level.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SweepStep {
    /// Position of the interval in [`Grid::intervals`].
    pub interval: usize,
    pub k: usize,
}

/// Horizontal boxes and vertical intervals over one topology.
#[derive(Clone, Debug)]
pub struct Grid {
    topology: Arc<dyn Topology>,
    default_box: HorizontalBox,
    color_boxes: HashMap<(LocationType, usize), HorizontalBox>,
    intervals: Vec<LevelInterval>,
}

impl Grid {
    /// Grid over `topology` computing the interior of `i_box x j_box` on every
    /// level.
    ///
    /// # Errors
    /// `InvalidBox` if a box extends past the mesh.
    pub fn new(
        topology: Arc<dyn Topology>,
        i_box: AxisBox,
        j_box: AxisBox,
    ) -> Result<Self, StencilError> {
        let dims = topology.dims();
        let default_box = HorizontalBox::new(i_box, j_box);
        check_box(&default_box, dims)?;
        let intervals = if dims.d3 == 0 {
            Vec::new()
        } else {
            vec![LevelInterval::new(0, dims.d3 - 1)?]
        };
        let grid = Self {
            topology,
            default_box,
            color_boxes: HashMap::new(),
            intervals,
        };
        crate::debug_invariants!(grid.validate_invariants(), "Grid::new");
        Ok(grid)
    }

    /// Grid with `halo` points excluded on both sides of both axes.
    pub fn with_halo(topology: Arc<dyn Topology>, halo: usize) -> Result<Self, StencilError> {
        let dims = topology.dims();
        Self::new(
            topology,
            AxisBox::with_halo(dims.d1, halo),
            AxisBox::with_halo(dims.d2, halo),
        )
    }

    /// Override the box for one color of one location.
    ///
    /// # Errors
    /// `InvalidBox` past the mesh, `UnsupportedLocation`, or `InvalidColor`
    /// for a color the location does not have.
    pub fn with_color_box(
        mut self,
        location: LocationType,
        color: usize,
        bx: HorizontalBox,
    ) -> Result<Self, StencilError> {
        check_box(&bx, self.topology.dims())?;
        match self.topology.n_colors(location) {
            None => return Err(StencilError::UnsupportedLocation(location)),
            Some(n) if color >= n => {
                return Err(StencilError::InvalidColor {
                    location,
                    color,
                    n_colors: n,
                });
            }
            Some(_) => {}
        }
        self.color_boxes.insert((location, color), bx);
        Ok(self)
    }

    /// Replace the vertical intervals.
    ///
    /// Intervals are executed in level order whatever order they are given
    /// in; an empty list computes nothing.
    ///
    /// # Errors
    /// `IntervalOutOfRange` if an interval reaches past the mesh column,
    /// `OverlappingIntervals` if two intervals share a level.
    pub fn with_intervals(mut self, intervals: Vec<LevelInterval>) -> Result<Self, StencilError> {
        let levels = self.topology.dims().d3;
        if let Some(bad) = intervals.iter().find(|iv| iv.end >= levels) {
            return Err(StencilError::IntervalOutOfRange {
                end: bad.end,
                levels,
            });
        }
        for (a, ia) in intervals.iter().enumerate() {
            if let Some(ib) = intervals[a + 1..].iter().find(|ib| ia.overlaps(ib)) {
                return Err(StencilError::OverlappingIntervals {
                    a_start: ia.start,
                    a_end: ia.end,
                    b_start: ib.start,
                    b_end: ib.end,
                });
            }
        }
        self.intervals = intervals;
        Ok(self)
    }

    pub fn topology(&self) -> &Arc<dyn Topology> {
        &self.topology
    }

    pub fn dims(&self) -> MeshDims {
        self.topology.dims()
    }

    pub fn intervals(&self) -> &[LevelInterval] {
        &self.intervals
    }

    /// Box used where no color box is set.
    pub fn default_box(&self) -> HorizontalBox {
        self.default_box
    }

    /// Box iterated for `color` of `location`.
    pub fn box_for(&self, location: LocationType, color: usize) -> HorizontalBox {
        self.color_boxes
            .get(&(location, color))
            .copied()
            .unwrap_or(self.default_box)
    }

    /// Whether `p` of `location` lies in the computed interior (any level of
    /// an interval).
    pub fn in_interior(&self, location: LocationType, p: GridPoint) -> bool {
        self.box_for(location, p.color).contains(p.i, p.j)
            && self.intervals.iter().any(|iv| iv.contains(p.k))
    }

    /// Levels in the order `order` visits them.
    ///
    /// `Forward` and `Parallel` go upward through the intervals sorted by
    /// start level; `Backward` is the exact reverse.
    pub fn sweep(&self, order: ExecutionOrder) -> Vec<SweepStep> {
        let mut sorted: Vec<(usize, &LevelInterval)> = self.intervals.iter().enumerate().collect();
        sorted.sort_by_key(|(_, iv)| iv.start);
        let mut steps: Vec<SweepStep> = sorted
            .into_iter()
            .flat_map(|(interval, iv)| (iv.start..=iv.end).map(move |k| SweepStep { interval, k }))
            .collect();
        if order == ExecutionOrder::Backward {
            steps.reverse();
        }
        steps
    }
}

fn check_box(bx: &HorizontalBox, dims: MeshDims) -> Result<(), StencilError> {
    for (axis, len) in [(bx.i, dims.d1), (bx.j, dims.d2)] {
        axis.validate_invariants()?;
        if axis.halo_end > len {
            return Err(StencilError::InvalidBox {
                bounds: axis.bounds(),
                len,
            });
        }
    }
    Ok(())
}

impl DebugInvariants for Grid {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Grid");
    }

    fn validate_invariants(&self) -> Result<(), StencilError> {
        let dims = self.topology.dims();
        check_box(&self.default_box, dims)?;
        for bx in self.color_boxes.values() {
            check_box(bx, dims)?;
        }
        for iv in &self.intervals {
            if iv.start > iv.end {
                return Err(StencilError::MalformedInterval {
                    start: iv.start,
                    end: iv.end,
                });
            }
            if iv.end >= dims.d3 {
                return Err(StencilError::IntervalOutOfRange {
                    end: iv.end,
                    levels: dims.d3,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::IcosahedralTopology;

    fn topo() -> Arc<dyn Topology> {
        Arc::new(IcosahedralTopology::new(6, 6, 6))
    }

    #[test]
    fn halo_box_excludes_both_ends() {
        let b = AxisBox::with_halo(6, 1);
        assert_eq!(b.interior(), 1..5);
        assert_eq!((b.halo_minus(), b.halo_plus()), (1, 1));
        assert!(AxisBox::with_halo(2, 1).is_empty());
        assert!(AxisBox::with_halo(1, 3).is_empty());
    }

    #[test]
    fn unordered_box_is_rejected() {
        assert!(matches!(
            AxisBox::new(0, 3, 2, 6),
            Err(StencilError::InvalidBox { .. })
        ));
        let too_long = AxisBox::new(0, 1, 5, 7).unwrap();
        let err = Grid::new(topo(), too_long, AxisBox::with_halo(6, 1)).unwrap_err();
        assert_eq!(err, StencilError::InvalidBox { bounds: [0, 1, 5, 7], len: 6 });
    }

    #[test]
    fn default_interval_covers_the_column() {
        let g = Grid::with_halo(topo(), 1).unwrap();
        assert_eq!(g.intervals(), &[LevelInterval::new(0, 5).unwrap()]);
        let ks: Vec<usize> = g.sweep(ExecutionOrder::Backward).iter().map(|s| s.k).collect();
        assert_eq!(ks, vec![5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn intervals_are_swept_in_level_order() {
        let g = Grid::with_halo(topo(), 1)
            .unwrap()
            .with_intervals(vec![
                LevelInterval::new(3, 4).unwrap(),
                LevelInterval::new(0, 1).unwrap(),
            ])
            .unwrap();
        let steps = g.sweep(ExecutionOrder::Forward);
        let ks: Vec<(usize, usize)> = steps.iter().map(|s| (s.interval, s.k)).collect();
        assert_eq!(ks, vec![(1, 0), (1, 1), (0, 3), (0, 4)]);
    }

    #[test]
    fn bad_intervals_are_rejected() {
        assert_eq!(
            LevelInterval::new(3, 2).unwrap_err(),
            StencilError::MalformedInterval { start: 3, end: 2 }
        );
        let g = Grid::with_halo(topo(), 1).unwrap();
        let err = g
            .clone()
            .with_intervals(vec![LevelInterval::new(0, 6).unwrap()])
            .unwrap_err();
        assert_eq!(err, StencilError::IntervalOutOfRange { end: 6, levels: 6 });
        let err = g
            .with_intervals(vec![
                LevelInterval::new(0, 2).unwrap(),
                LevelInterval::new(2, 4).unwrap(),
            ])
            .unwrap_err();
        assert!(matches!(err, StencilError::OverlappingIntervals { .. }));
    }

    #[test]
    fn color_box_overrides_default() {
        let narrow = HorizontalBox::new(AxisBox::with_halo(6, 2), AxisBox::with_halo(6, 1));
        let g = Grid::with_halo(topo(), 1)
            .unwrap()
            .with_color_box(LocationType::Edge, 2, narrow)
            .unwrap();
        assert_eq!(g.box_for(LocationType::Edge, 2), narrow);
        assert_ne!(g.box_for(LocationType::Edge, 1), narrow);
        assert!(!g.in_interior(LocationType::Edge, GridPoint::new(1, 2, 1, 0)));
        assert!(g.in_interior(LocationType::Edge, GridPoint::new(1, 1, 1, 0)));
        assert!(
            g.with_color_box(LocationType::Vertex, 1, narrow).is_err(),
            "vertices have a single color"
        );
    }
}
