//! Icosahedral (triangular) mesh topology.
//!
//! Vertices sit on a skewed `(i, j)` lattice. Each lattice position owns:
//! - two cells: color 0 spans `v(i,j), v(i+1,j), v(i,j+1)`, color 1 spans
//!   `v(i+1,j), v(i+1,j+1), v(i,j+1)`;
//! - three edges: color 0 `v(i,j)-v(i+1,j)`, color 1 `v(i+1,j)-v(i,j+1)`,
//!   color 2 `v(i,j)-v(i,j+1)`;
//! - one vertex.
//!
//! Every neighbor lies within one lattice step, so a horizontal halo of 1
//! keeps all interior neighborhoods inside the mesh.

use super::{GridKind, LocationType, MeshDims, NeighborOffset, Topology, nb};

type Table = &'static [&'static [NeighborOffset]];

const CELL_CELL: Table = &[
    &[nb(0, 1, -1), nb(0, 1, 0), nb(-1, 1, 0)],
    &[nb(0, 0, 0), nb(1, 0, 0), nb(0, 0, 1)],
];
const CELL_EDGE: Table = &[
    &[nb(0, 0, 0), nb(0, 1, 0), nb(0, 2, 0)],
    &[nb(0, 1, 0), nb(1, 2, 0), nb(0, 0, 1)],
];
const CELL_VERTEX: Table = &[
    &[nb(0, 0, 0), nb(1, 0, 0), nb(0, 0, 1)],
    &[nb(1, 0, 0), nb(1, 0, 1), nb(0, 0, 1)],
];
const EDGE_CELL: Table = &[
    &[nb(0, 0, 0), nb(0, 1, -1)],
    &[nb(0, 0, 0), nb(0, 1, 0)],
    &[nb(0, 0, 0), nb(-1, 1, 0)],
];
const EDGE_EDGE: Table = &[
    &[nb(0, 1, 0), nb(0, 2, 0), nb(0, 1, -1), nb(1, 2, -1)],
    &[nb(0, 0, 0), nb(0, 2, 0), nb(1, 2, 0), nb(0, 0, 1)],
    &[nb(0, 0, 0), nb(0, 1, 0), nb(-1, 1, 0), nb(-1, 0, 1)],
];
const EDGE_VERTEX: Table = &[
    &[nb(0, 0, 0), nb(1, 0, 0)],
    &[nb(1, 0, 0), nb(0, 0, 1)],
    &[nb(0, 0, 0), nb(0, 0, 1)],
];
// counter-clockwise, starting from the east
const VERTEX_CELL: Table = &[&[
    nb(0, 0, 0),
    nb(-1, 1, 0),
    nb(-1, 0, 0),
    nb(-1, 1, -1),
    nb(0, 0, -1),
    nb(0, 1, -1),
]];
const VERTEX_EDGE: Table = &[&[
    nb(0, 0, 0),
    nb(0, 2, 0),
    nb(-1, 1, 0),
    nb(-1, 0, 0),
    nb(0, 2, -1),
    nb(0, 1, -1),
]];
const VERTEX_VERTEX: Table = &[&[
    nb(1, 0, 0),
    nb(0, 0, 1),
    nb(-1, 0, 1),
    nb(-1, 0, 0),
    nb(0, 0, -1),
    nb(1, 0, -1),
]];

/// Triangular mesh of `d1 x d2` lattice positions and `d3` levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IcosahedralTopology {
    dims: MeshDims,
}

impl IcosahedralTopology {
    pub fn new(d1: usize, d2: usize, d3: usize) -> Self {
        Self {
            dims: MeshDims::new(d1, d2, d3),
        }
    }

    fn table(from: LocationType, to: LocationType) -> Table {
        use LocationType::*;
        match (from, to) {
            (Cell, Cell) => CELL_CELL,
            (Cell, Edge) => CELL_EDGE,
            (Cell, Vertex) => CELL_VERTEX,
            (Edge, Cell) => EDGE_CELL,
            (Edge, Edge) => EDGE_EDGE,
            (Edge, Vertex) => EDGE_VERTEX,
            (Vertex, Cell) => VERTEX_CELL,
            (Vertex, Edge) => VERTEX_EDGE,
            (Vertex, Vertex) => VERTEX_VERTEX,
        }
    }
}

impl Topology for IcosahedralTopology {
    fn kind(&self) -> GridKind {
        GridKind::Icosahedral
    }

    fn dims(&self) -> MeshDims {
        self.dims
    }

    fn n_colors(&self, location: LocationType) -> Option<usize> {
        Some(location.n_colors())
    }

    fn offsets(
        &self,
        from: LocationType,
        to: LocationType,
        color: usize,
    ) -> Option<&[NeighborOffset]> {
        Self::table(from, to).get(color).copied()
    }
}
