//! StorageLayout: the index function of a storage.
//!
//! Grid points are linearized as
//! `index = ((i * n_colors + color) * d2 + j) * d3 + k`.
//! The vertical level is the fastest-varying dimension, so each column
//! `(i, color, j, *)` is one contiguous run of `d3` elements. Kernel
//! strategies rely on this: a column ("lane") is the unit of parallel work and
//! its slice can be handed out mutably without aliasing any other lane.

use crate::debug_invariants::DebugInvariants;
use crate::stencil_error::StencilError;
use crate::topology::point::GridPoint;

/// Dimensions `(d1, n_colors, d2, d3)` of one storage and its index function.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StorageLayout {
    d1: usize,
    n_colors: usize,
    d2: usize,
    d3: usize,
}

impl StorageLayout {
    pub fn new(d1: usize, n_colors: usize, d2: usize, d3: usize) -> Self {
        let layout = Self {
            d1,
            n_colors,
            d2,
            d3,
        };
        crate::debug_invariants!(layout.validate_invariants(), "StorageLayout::new");
        layout
    }

    /// `[d1, n_colors, d2, d3]`.
    #[inline]
    pub fn dims(&self) -> [usize; 4] {
        [self.d1, self.n_colors, self.d2, self.d3]
    }

    #[inline]
    pub fn n_colors(&self) -> usize {
        self.n_colors
    }

    /// Number of vertical levels, i.e. the length of one lane.
    #[inline]
    pub fn levels(&self) -> usize {
        self.d3
    }

    /// Total number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.d1 * self.n_colors * self.d2 * self.d3
    }

    /// Number of columns `(i, color, j)`.
    #[inline]
    pub fn lane_count(&self) -> usize {
        self.d1 * self.n_colors * self.d2
    }

    #[inline]
    pub fn contains(&self, p: GridPoint) -> bool {
        p.i < self.d1 && p.color < self.n_colors && p.j < self.d2 && p.k < self.d3
    }

    /// Column index of `p` (ignores `p.k`). No bounds check.
    #[inline]
    pub fn lane_of(&self, p: GridPoint) -> usize {
        (p.i * self.n_colors + p.color) * self.d2 + p.j
    }

    /// Linear index of `p`. No bounds check.
    #[inline]
    pub fn index_unchecked(&self, p: GridPoint) -> usize {
        self.lane_of(p) * self.d3 + p.k
    }

    /// Linear index of `p`.
    ///
    /// # Errors
    /// `IndexOutOfRange` if any coordinate exceeds its dimension.
    #[inline]
    pub fn index(&self, p: GridPoint) -> Result<usize, StencilError> {
        if self.contains(p) {
            Ok(self.index_unchecked(p))
        } else {
            Err(StencilError::IndexOutOfRange {
                point: p,
                dims: self.dims(),
            })
        }
    }

    /// Inverse of [`index`](Self::index).
    pub fn grid_point_of(&self, index: usize) -> Result<GridPoint, StencilError> {
        if index >= self.size() {
            return Err(StencilError::IndexOutOfRange {
                point: GridPoint::new(index, 0, 0, 0),
                dims: self.dims(),
            });
        }
        let k = index % self.d3;
        let lane = index / self.d3;
        let j = lane % self.d2;
        let ic = lane / self.d2;
        Ok(GridPoint::new(ic / self.n_colors, ic % self.n_colors, j, k))
    }

    /// Grid point at the start of column `lane` (level 0). No bounds check.
    #[inline]
    pub fn lane_origin(&self, lane: usize) -> GridPoint {
        let j = lane % self.d2;
        let ic = lane / self.d2;
        GridPoint::new(ic / self.n_colors, ic % self.n_colors, j, 0)
    }
}

impl DebugInvariants for StorageLayout {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "StorageLayout");
    }

    fn validate_invariants(&self) -> Result<(), StencilError> {
        let size = self
            .d1
            .checked_mul(self.n_colors)
            .and_then(|n| n.checked_mul(self.d2))
            .and_then(|n| n.checked_mul(self.d3));
        if size.is_none() {
            return Err(StencilError::LayoutOverflow { dims: self.dims() });
        }
        Ok(())
    }
}
