//! Structured (Cartesian) mesh topology.
//!
//! Cells and vertices only, one color each. Cell `(i, j)` has corners
//! `v(i,j), v(i+1,j), v(i+1,j+1), v(i,j+1)`. Edges are not provided; stages
//! on edges are rejected when a computation is built over this topology.

use super::{GridKind, LocationType, MeshDims, NeighborOffset, Topology, nb};

const FACES: &[NeighborOffset] = &[nb(1, 0, 0), nb(0, 0, 1), nb(-1, 0, 0), nb(0, 0, -1)];
const CELL_CORNERS: &[NeighborOffset] = &[nb(0, 0, 0), nb(1, 0, 0), nb(1, 0, 1), nb(0, 0, 1)];
const VERTEX_CELLS: &[NeighborOffset] = &[nb(0, 0, 0), nb(-1, 0, 0), nb(-1, 0, -1), nb(0, 0, -1)];

/// Cartesian mesh of `d1 x d2` positions and `d3` levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StructuredTopology {
    dims: MeshDims,
}

impl StructuredTopology {
    pub fn new(d1: usize, d2: usize, d3: usize) -> Self {
        Self {
            dims: MeshDims::new(d1, d2, d3),
        }
    }
}

impl Topology for StructuredTopology {
    fn kind(&self) -> GridKind {
        GridKind::Structured
    }

    fn dims(&self) -> MeshDims {
        self.dims
    }

    fn n_colors(&self, location: LocationType) -> Option<usize> {
        match location {
            LocationType::Cell | LocationType::Vertex => Some(1),
            LocationType::Edge => None,
        }
    }

    fn offsets(
        &self,
        from: LocationType,
        to: LocationType,
        color: usize,
    ) -> Option<&[NeighborOffset]> {
        if color != 0 {
            return None;
        }
        match (from, to) {
            (LocationType::Cell, LocationType::Cell)
            | (LocationType::Vertex, LocationType::Vertex) => Some(FACES),
            (LocationType::Cell, LocationType::Vertex) => Some(CELL_CORNERS),
            (LocationType::Vertex, LocationType::Cell) => Some(VERTEX_CELLS),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::GridPoint;

    #[test]
    fn cell_faces_are_the_four_axis_neighbors() {
        let t = StructuredTopology::new(5, 5, 1);
        let ns = t
            .neighbors_of(LocationType::Cell, LocationType::Cell, GridPoint::new(2, 0, 2, 0))
            .unwrap();
        assert_eq!(
            ns,
            vec![
                GridPoint::new(3, 0, 2, 0),
                GridPoint::new(2, 0, 3, 0),
                GridPoint::new(1, 0, 2, 0),
                GridPoint::new(2, 0, 1, 0),
            ]
        );
    }

    #[test]
    fn corners_round_trip() {
        let t = StructuredTopology::new(5, 5, 1);
        let cell = GridPoint::new(2, 0, 2, 0);
        for v in t.neighbors_of(LocationType::Cell, LocationType::Vertex, cell).unwrap() {
            let cells = t.neighbors_of(LocationType::Vertex, LocationType::Cell, v).unwrap();
            assert!(cells.contains(&cell));
        }
    }

    #[test]
    fn edges_are_unsupported() {
        let t = StructuredTopology::new(5, 5, 1);
        assert_eq!(t.n_colors(LocationType::Edge), None);
        assert!(!t.supports(LocationType::Cell, LocationType::Edge));
        assert_eq!(t.neighbor_radius(LocationType::Edge, LocationType::Cell), None);
    }
}
