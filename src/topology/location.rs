//! Location types of a mesh: cells, edges and vertices.

use std::fmt;

/// Topological kind of a mesh element.
///
/// On an icosahedral (triangular) mesh every location comes in a fixed number
/// of colors, i.e. topologically distinct variants per `(i, j)` position:
/// two triangles, three edge orientations and one vertex.
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum LocationType {
    /// 2D element (triangle on icosahedral meshes, quad on structured ones).
    Cell,
    /// 1D element between two vertices.
    Edge,
    /// 0D element.
    Vertex,
}

impl LocationType {
    /// All locations in declaration order.
    pub const ALL: [LocationType; 3] = [LocationType::Cell, LocationType::Edge, LocationType::Vertex];

    /// Colors per `(i, j)` position on an icosahedral mesh.
    #[inline]
    pub const fn n_colors(self) -> usize {
        match self {
            LocationType::Cell => 2,
            LocationType::Edge => 3,
            LocationType::Vertex => 1,
        }
    }

    /// Topological dimension of the element.
    #[inline]
    pub const fn dimension(self) -> u8 {
        match self {
            LocationType::Cell => 2,
            LocationType::Edge => 1,
            LocationType::Vertex => 0,
        }
    }

    /// Dense index in `0..3`, usable for per-location tables.
    #[inline]
    pub const fn ordinal(self) -> usize {
        match self {
            LocationType::Cell => 0,
            LocationType::Edge => 1,
            LocationType::Vertex => 2,
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationType::Cell => f.write_str("cells"),
            LocationType::Edge => f.write_str("edges"),
            LocationType::Vertex => f.write_str("vertices"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icosahedral_color_counts() {
        assert_eq!(LocationType::Cell.n_colors(), 2);
        assert_eq!(LocationType::Edge.n_colors(), 3);
        assert_eq!(LocationType::Vertex.n_colors(), 1);
    }

    #[test]
    fn ordinals_are_dense() {
        let ords: Vec<_> = LocationType::ALL.iter().map(|l| l.ordinal()).collect();
        assert_eq!(ords, vec![0, 1, 2]);
    }

    #[test]
    fn display_uses_plural_names() {
        assert_eq!(LocationType::Cell.to_string(), "cells");
        assert_eq!(LocationType::Vertex.to_string(), "vertices");
    }
}
