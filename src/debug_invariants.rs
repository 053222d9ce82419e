//! Structural self-checks for the crate's indexed containers.
//!
//! Implementors and what they verify:
//! - `StorageLayout`: the element count `d1 * n_colors * d2 * d3` fits in
//!   `usize`, so the index function is a bijection onto `0..size`.
//! - `Storage`: its layout, and a host buffer exactly `size` elements long.
//! - `Domain`: the placeholder index points at the binding it names and
//!   every storage agrees with its placeholder's location.
//! - `AxisBox`: halo and interior bounds are nested in order.
//! - `Grid`: default and per-color boxes lie inside the mesh, and every
//!   vertical interval is well formed and within the column.
//! - `Schedule`: the writer index matches the stages, and stage reads
//!   respect the execution order.
//!
//! Checks run after construction and mutation in debug builds, or in release
//! builds with the `check-invariants` feature.

use crate::stencil_error::StencilError;

pub trait DebugInvariants {
    /// Panic on a broken invariant when checking is compiled in; no-op
    /// otherwise.
    fn debug_assert_invariants(&self);
    /// First broken invariant, if any.
    fn validate_invariants(&self) -> Result<(), StencilError>;
}

/// Panic with `$ctx` and the error when `$expr` is `Err` and checking is
/// compiled in.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
