//! StencilError: Unified error type for mesh-stencil public APIs
//!
//! Every fallible operation in the crate, from storage indexing to schedule
//! validation and kernel dispatch, reports through this type. Build-time
//! (structural) failures are returned before anything executes; run-time
//! failures abort the current `run()`.

use thiserror::Error;

use crate::stencil::computation::Lifecycle;
use crate::topology::location::LocationType;
use crate::topology::point::GridPoint;

/// Unified error type for mesh-stencil operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StencilError {
    // ---- build-time -------------------------------------------------------
    /// An accessor, placeholder or storage disagree on their location type.
    #[error("location mismatch for placeholder {placeholder}: expected {expected}, found {found}")]
    LocationMismatch {
        placeholder: usize,
        expected: LocationType,
        found: LocationType,
    },
    /// A stage references a placeholder that is not bound in the domain.
    #[error("placeholder {0} is referenced by a stage but not bound in the domain")]
    UnboundPlaceholder(usize),
    /// The same placeholder was bound twice in one domain.
    #[error("placeholder {0} is bound more than once")]
    DuplicateBinding(usize),
    /// The same placeholder appears twice among one stage's arguments.
    #[error("placeholder {placeholder} appears more than once in stage `{stage}`")]
    DuplicatePlaceholder { placeholder: usize, stage: String },
    /// Stage argument count differs from the rule's accessor count.
    #[error("stage `{stage}` binds {found} placeholders but its rule declares {expected} accessors")]
    ArityMismatch {
        stage: String,
        expected: usize,
        found: usize,
    },
    /// Rule accessors are not numbered `0..n` in declaration order.
    #[error("rule `{rule}` declares accessor slot {found} at position {position}")]
    MalformedRule {
        rule: String,
        position: usize,
        found: usize,
    },
    /// A vertical interval whose start level lies after its end level.
    #[error("malformed vertical interval [{start}, {end}]")]
    MalformedInterval { start: usize, end: usize },
    /// Two vertical intervals share at least one level.
    #[error("vertical intervals [{a_start}, {a_end}] and [{b_start}, {b_end}] overlap")]
    OverlappingIntervals {
        a_start: usize,
        a_end: usize,
        b_start: usize,
        b_end: usize,
    },
    /// A vertical interval reaches past the mesh column.
    #[error("vertical interval ends at level {end} but the mesh has {levels} levels")]
    IntervalOutOfRange { end: usize, levels: usize },
    /// A horizontal box is not ordered or exceeds the mesh.
    #[error("invalid horizontal box {bounds:?} for axis of length {len}")]
    InvalidBox { bounds: [usize; 4], len: usize },
    /// A color outside `0..n_colors` of a location.
    #[error("color {color} out of range for {location} ({n_colors} colors)")]
    InvalidColor {
        location: LocationType,
        color: usize,
        n_colors: usize,
    },
    /// Storage dimensions whose element count does not fit in `usize`.
    #[error("storage dimensions {dims:?} overflow the address space")]
    LayoutOverflow { dims: [usize; 4] },
    /// A schedule or computation without stages.
    #[error("schedule contains no stages")]
    EmptySchedule,
    /// Two stages of one schedule write the same placeholder.
    #[error("stages {first} and {second} both write placeholder {placeholder}")]
    ConflictingWrites {
        placeholder: usize,
        first: usize,
        second: usize,
    },
    /// A vertical read dependency contradicts the schedule's execution order.
    #[error(
        "stage {reader} reads placeholder {placeholder} (written by stage {writer}) with a vertical offset the execution order cannot honour"
    )]
    VerticalDependency {
        placeholder: usize,
        reader: usize,
        writer: usize,
    },
    /// Stages of a `Parallel` schedule share a placeholder one of them writes.
    #[error(
        "stage {reader} uses placeholder {placeholder} written by stage {writer}; dependent stages cannot run in parallel order"
    )]
    OrderingDependency {
        placeholder: usize,
        reader: usize,
        writer: usize,
    },
    /// An accessor extent that its mode does not allow.
    #[error("accessor slot {slot}: {reason}")]
    InvalidExtent { slot: usize, reason: &'static str },
    /// An accessor's extent reaches outside the mesh from the interior box.
    #[error("extent of placeholder {placeholder} exceeds the halo of the {location} grid")]
    ExtentExceedsHalo {
        placeholder: usize,
        location: LocationType,
    },
    /// The topology does not provide this location.
    #[error("topology does not support location {0}")]
    UnsupportedLocation(LocationType),
    /// The topology does not provide this neighbor relation.
    #[error("topology does not provide a {from} -> {to} neighbor relation")]
    UnsupportedRelation {
        from: LocationType,
        to: LocationType,
    },
    /// A storage's dimensions disagree with the grid's mesh.
    #[error("storage `{name}` has dimensions {found:?}, grid expects {expected:?}")]
    DimensionMismatch {
        name: String,
        expected: [usize; 4],
        found: [usize; 4],
    },

    // ---- run-time ---------------------------------------------------------
    /// Indexed access outside `[0, d)` on some axis.
    #[error("grid point {point} is outside storage dimensions {dims:?}")]
    IndexOutOfRange { point: GridPoint, dims: [usize; 4] },
    /// An accessor read at an offset it did not declare.
    #[error("accessor slot {slot} read at offset ({di}, {dj}, {dk}) outside its extent")]
    OffsetOutsideExtent {
        slot: usize,
        di: isize,
        dj: isize,
        dk: isize,
    },
    /// A neighbor of `point` falls outside the mesh.
    #[error("{to} neighbor of {from} point {point} lies outside the mesh")]
    NeighborOutsideMesh {
        from: LocationType,
        to: LocationType,
        point: GridPoint,
    },
    /// An accessor used in a way its mode or location forbids.
    #[error("accessor slot {slot}: {reason}")]
    IncompatibleAccess { slot: usize, reason: &'static str },
    /// Read of a buffer copy that is stale on the requested side.
    #[error("storage `{name}` is stale on the {side} side; synchronize before use")]
    StaleBuffer { name: String, side: Residency },
    /// Access after explicit teardown.
    #[error("storage `{0}` has been released")]
    BufferReleased(String),
    /// The accelerator could not provide memory for a buffer.
    #[error("device allocation of {requested} bytes failed ({available} bytes available)")]
    DeviceAllocation { requested: usize, available: usize },
    /// Lifecycle call in a state that does not permit it.
    #[error("cannot {action} a computation in state {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: Lifecycle,
    },
}

/// Which copy of a dual-resident buffer an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Residency {
    Host,
    Device,
}

impl std::fmt::Display for Residency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Residency::Host => f.write_str("host"),
            Residency::Device => f.write_str("device"),
        }
    }
}
