//! Mesh topology: location types, grid points and neighbor providers.
//!
//! A [`Topology`] answers two questions for the execution engine: how many
//! colors each location has, and which points of location `to` neighbor a
//! point of location `from`. Both shipped providers describe neighbors as
//! fixed per-color offset tables, so enumeration order is stable for every
//! `(from, to, point)` triple.

pub mod icosahedral;
pub mod location;
pub mod point;
pub mod structured;

pub use icosahedral::IcosahedralTopology;
pub use location::LocationType;
pub use point::GridPoint;
pub use structured::StructuredTopology;

use std::fmt::Debug;

use crate::stencil_error::StencilError;

/// Mesh family, used to select the kernel strategy's lane map.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum GridKind {
    /// Cartesian mesh, one color per location.
    Structured,
    /// Triangular mesh with multi-colored locations.
    Icosahedral,
}

/// Extents of a mesh: `d1 x d2` horizontal positions, `d3` vertical levels.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeshDims {
    pub d1: usize,
    pub d2: usize,
    pub d3: usize,
}

impl MeshDims {
    pub const fn new(d1: usize, d2: usize, d3: usize) -> Self {
        Self { d1, d2, d3 }
    }
}

/// One entry of a neighbor table: move by `(di, dj)` and land on `color`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NeighborOffset {
    pub di: isize,
    pub color: usize,
    pub dj: isize,
}

/// Shorthand for table literals.
pub(crate) const fn nb(di: isize, color: usize, dj: isize) -> NeighborOffset {
    NeighborOffset { di, color, dj }
}

/// Grid topology provider.
///
/// Implementations must be total and deterministic on interior points:
/// repeated calls with the same arguments yield the same neighbors in the same
/// order.
pub trait Topology: Debug + Send + Sync {
    /// Mesh family.
    fn kind(&self) -> GridKind;

    /// Mesh extents.
    fn dims(&self) -> MeshDims;

    /// Colors of `location`, or `None` if the mesh has no such location.
    fn n_colors(&self, location: LocationType) -> Option<usize>;

    /// Per-color offset table for `from -> to`, `None` if the relation is not
    /// provided.
    fn offsets(&self, from: LocationType, to: LocationType, color: usize)
    -> Option<&[NeighborOffset]>;

    /// Whether the `from -> to` relation is available.
    fn supports(&self, from: LocationType, to: LocationType) -> bool {
        self.offsets(from, to, 0).is_some()
    }

    /// Largest horizontal distance `(i, j)` any `from -> to` neighbor lies at.
    fn neighbor_radius(&self, from: LocationType, to: LocationType) -> Option<(usize, usize)> {
        let colors = self.n_colors(from)?;
        let mut radius = (0usize, 0usize);
        for c in 0..colors {
            for o in self.offsets(from, to, c)? {
                radius.0 = radius.0.max(o.di.unsigned_abs());
                radius.1 = radius.1.max(o.dj.unsigned_abs());
            }
        }
        Some(radius)
    }

    /// Append the `to` neighbors of `point` (a `from` point) to `out`.
    fn neighbors_into(
        &self,
        from: LocationType,
        to: LocationType,
        point: GridPoint,
        out: &mut Vec<GridPoint>,
    ) -> Result<(), StencilError> {
        let table = self
            .offsets(from, to, point.color)
            .ok_or(StencilError::UnsupportedRelation { from, to })?;
        let dims = self.dims();
        let outside = || StencilError::NeighborOutsideMesh { from, to, point };
        for o in table {
            let n = point.offset(o.di, o.color, o.dj, 0).ok_or_else(outside)?;
            if n.i >= dims.d1 || n.j >= dims.d2 {
                return Err(outside());
            }
            out.push(n);
        }
        Ok(())
    }

    /// The `to` neighbors of `point` in provider order.
    fn neighbors_of(
        &self,
        from: LocationType,
        to: LocationType,
        point: GridPoint,
    ) -> Result<Vec<GridPoint>, StencilError> {
        let mut out = Vec::new();
        self.neighbors_into(from, to, point, &mut out)?;
        Ok(out)
    }
}
