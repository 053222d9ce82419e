//! Accessors: the typed parameter slots a rule reads and writes through.

use crate::stencil_error::StencilError;
use crate::topology::location::LocationType;

/// Whether a rule only reads a parameter or also writes it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Intent {
    In,
    InOut,
}

/// Neighbor-access radius of an accessor, per axis and direction.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Extent {
    pub i_minus: usize,
    pub i_plus: usize,
    pub j_minus: usize,
    pub j_plus: usize,
    pub k_minus: usize,
    pub k_plus: usize,
}

impl Extent {
    /// Point access only.
    pub const ZERO: Extent = Extent::new(0, 0, 0, 0, 0, 0);

    pub const fn new(
        i_minus: usize,
        i_plus: usize,
        j_minus: usize,
        j_plus: usize,
        k_minus: usize,
        k_plus: usize,
    ) -> Self {
        Self {
            i_minus,
            i_plus,
            j_minus,
            j_plus,
            k_minus,
            k_plus,
        }
    }

    /// Symmetric horizontal radius `r`, no vertical access.
    pub const fn horizontal(r: usize) -> Self {
        Self::new(r, r, r, r, 0, 0)
    }

    /// Vertical access only, `below` levels down and `above` levels up.
    pub const fn vertical(below: usize, above: usize) -> Self {
        Self::new(0, 0, 0, 0, below, above)
    }

    /// Whether the offset `(di, dj, dk)` lies inside the extent.
    #[inline]
    pub fn contains(&self, di: isize, dj: isize, dk: isize) -> bool {
        let within = |d: isize, minus: usize, plus: usize| {
            if d < 0 {
                d.unsigned_abs() <= minus
            } else {
                d.unsigned_abs() <= plus
            }
        };
        within(di, self.i_minus, self.i_plus)
            && within(dj, self.j_minus, self.j_plus)
            && within(dk, self.k_minus, self.k_plus)
    }

    #[inline]
    pub fn is_horizontally_zero(&self) -> bool {
        self.i_minus == 0 && self.i_plus == 0 && self.j_minus == 0 && self.j_plus == 0
    }

    #[inline]
    pub fn is_vertically_zero(&self) -> bool {
        self.k_minus == 0 && self.k_plus == 0
    }

    /// Whether every horizontal radius is at least `(ri, rj)`.
    #[inline]
    pub fn covers_horizontal(&self, ri: usize, rj: usize) -> bool {
        self.i_minus >= ri && self.i_plus >= ri && self.j_minus >= rj && self.j_plus >= rj
    }
}

/// Relative position `(di, dj, dk)` for same-location reads.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Offset {
    pub di: isize,
    pub dj: isize,
    pub dk: isize,
}

impl Offset {
    pub const ZERO: Offset = Offset::new(0, 0, 0);

    pub const fn new(di: isize, dj: isize, dk: isize) -> Self {
        Self { di, dj, dk }
    }

    /// Purely vertical offset.
    pub const fn k(dk: isize) -> Self {
        Self::new(0, 0, dk)
    }
}

/// One parameter slot of a rule.
///
/// Rules declare their accessors as constants and hand the same constants to
/// [`Evaluation`](crate::stencil::evaluation::Evaluation) when reading or
/// writing:
///
/// ```rust
/// use mesh_stencil::stencil::accessor::{Accessor, Extent};
/// use mesh_stencil::topology::LocationType;
///
/// const IN: Accessor = Accessor::input(0, LocationType::Cell, Extent::horizontal(1));
/// const OUT: Accessor = Accessor::inout(1, LocationType::Cell);
/// assert!(OUT.is_writable() && !IN.is_writable());
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Accessor {
    pub slot: usize,
    pub location: LocationType,
    pub extent: Extent,
    pub intent: Intent,
}

impl Accessor {
    /// Read-only slot with neighbor radius `extent`.
    pub const fn input(slot: usize, location: LocationType, extent: Extent) -> Self {
        Self {
            slot,
            location,
            extent,
            intent: Intent::In,
        }
    }

    /// Read-write slot at the evaluated point.
    pub const fn inout(slot: usize, location: LocationType) -> Self {
        Self {
            slot,
            location,
            extent: Extent::ZERO,
            intent: Intent::InOut,
        }
    }

    /// Replace the extent, e.g. to let an inout slot read earlier levels.
    pub const fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = extent;
        self
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.intent == Intent::InOut
    }

    /// Check the extent is legal for the intent.
    ///
    /// Written fields are only visible at the evaluated column: an inout
    /// accessor may reach other levels but never other horizontal positions.
    pub fn validate(&self) -> Result<(), StencilError> {
        if self.is_writable() && !self.extent.is_horizontally_zero() {
            return Err(StencilError::InvalidExtent {
                slot: self.slot,
                reason: "inout accessors cannot have a horizontal extent",
            });
        }
        Ok(())
    }
}
