//! `GridPoint`: a position `(i, color, j, k)` on a colored mesh
//!
//! `i` and `j` are the two horizontal indices, `color` selects one of the
//! topologically distinct variants of a location at `(i, j)`, and `k` is the
//! vertical level. Storages linearize grid points through
//! [`StorageLayout`](crate::data::layout::StorageLayout).

use std::fmt;

/// A position on the mesh for some (implicit) location type.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize,
)]
pub struct GridPoint {
    pub i: usize,
    pub color: usize,
    pub j: usize,
    pub k: usize,
}

impl GridPoint {
    #[inline]
    pub const fn new(i: usize, color: usize, j: usize, k: usize) -> Self {
        Self { i, color, j, k }
    }

    /// Move by `(di, dj, dk)` and switch to `color`.
    ///
    /// Returns `None` if any index would become negative. Upper bounds are the
    /// caller's concern.
    #[inline]
    pub fn offset(self, di: isize, color: usize, dj: isize, dk: isize) -> Option<Self> {
        Some(Self {
            i: self.i.checked_add_signed(di)?,
            color,
            j: self.j.checked_add_signed(dj)?,
            k: self.k.checked_add_signed(dk)?,
        })
    }

    /// The same horizontal position and color at level `k`.
    #[inline]
    pub const fn at_level(self, k: usize) -> Self {
        Self { k, ..self }
    }
}

impl fmt::Debug for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GridPoint")
            .field(&self.i)
            .field(&self.color)
            .field(&self.j)
            .field(&self.k)
            .finish()
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.i, self.color, self.j, self.k)
    }
}

impl From<[usize; 4]> for GridPoint {
    fn from([i, color, j, k]: [usize; 4]) -> Self {
        Self::new(i, color, j, k)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_moves_and_recolors() {
        let p = GridPoint::new(2, 0, 3, 1);
        assert_eq!(p.offset(-1, 1, 0, 2), Some(GridPoint::new(1, 1, 3, 3)));
    }

    #[test]
    fn offset_below_zero_is_none() {
        let p = GridPoint::new(0, 0, 3, 0);
        assert_eq!(p.offset(-1, 0, 0, 0), None);
        assert_eq!(p.offset(0, 0, 0, -1), None);
    }

    #[test]
    fn debug_and_display() {
        let p = GridPoint::new(1, 2, 3, 4);
        assert_eq!(format!("{:?}", p), "GridPoint(1, 2, 3, 4)");
        assert_eq!(format!("{}", p), "(1, 2, 3, 4)");
    }
}
