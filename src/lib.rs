#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-stencil
//!
//! mesh-stencil composes and executes stencil computations on structured and
//! icosahedral (triangular) meshes, for weather and climate style PDE codes.
//! A computation is a set of pointwise rules ("stages") that read fields at
//! neighboring mesh points and write fields at the evaluated point, iterated
//! over a 3-D grid of horizontal positions and vertical levels.
//!
//! ## Features
//! - Colored mesh locations (cells, edges, vertices) and a [`Topology`]
//!   trait supplying neighbor relations between them
//! - Storages with a fixed index function and explicit host/accelerator copies
//! - Neighbor reductions over any location pair the topology provides
//! - Schedules with forward, backward or parallel vertical order, validated
//!   before anything runs
//! - Host and accelerator kernel strategies that produce identical results
//!
//! ## Cargo features
//! - `rayon` (default): lanes run on the rayon thread pool.
//! - `check-invariants`: run [`DebugInvariants`] checks in release builds.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mesh_stencil::prelude::*;
//!
//! /// Sum of the three neighboring cells.
//! struct NeighborSum;
//!
//! impl NeighborSum {
//!     const IN: Accessor = Accessor::input(0, LocationType::Cell, Extent::horizontal(1));
//!     const OUT: Accessor = Accessor::inout(1, LocationType::Cell);
//! }
//!
//! impl Rule<f64> for NeighborSum {
//!     fn accessors(&self) -> Vec<Accessor> {
//!         vec![Self::IN, Self::OUT]
//!     }
//!
//!     fn apply(&self, eval: &mut Evaluation<'_, '_, f64>) {
//!         let s = eval.reduce_neighbors(&Self::IN, 0.0, |acc, v| acc + v);
//!         eval.set(&Self::OUT, s);
//!     }
//! }
//!
//! # fn main() -> Result<(), StencilError> {
//! let topology: Arc<dyn Topology> = Arc::new(IcosahedralTopology::new(6, 6, 6));
//! let factory = StorageFactory::new(topology.clone()).with_device(Device::new("doc"));
//! let mut input = factory.make_storage::<f64>(LocationType::Cell, "in")?;
//! input.initialize_everywhere(1.0)?;
//! let output = factory.make_storage::<f64>(LocationType::Cell, "out")?;
//!
//! let p_in = Placeholder::new(0, LocationType::Cell);
//! let p_out = Placeholder::new(1, LocationType::Cell);
//! let domain = Domain::bind([(p_in, input), (p_out, output)])?;
//! let grid = Grid::with_halo(topology, 1)?;
//! let stage = Stage::new(NeighborSum, LocationType::Cell, [p_in, p_out])?;
//!
//! let mut computation = Computation::builder(domain, grid)
//!     .schedule(Schedule::new(ExecutionOrder::Forward, vec![stage])?)
//!     .build()?;
//! computation.ready()?;
//! computation.steady()?;
//! computation.run()?;
//! computation.finalize()?;
//! assert_eq!(computation.storage(&p_out)?.get([2, 0, 2, 3])?, 3.0);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod data;
pub mod debug_invariants;
pub mod stencil;
pub mod stencil_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use stencil_error::StencilError;
pub use topology::Topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::backend::{Backend, ExecutionStrategy, strategy_for};
    pub use crate::data::{Device, Element, Storage, StorageFactory, StorageLayout};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::stencil::accessor::{Accessor, Extent, Intent, Offset};
    pub use crate::stencil::computation::{Computation, Lifecycle};
    pub use crate::stencil::config::{BoundsPolicy, ExecutionConfig};
    pub use crate::stencil::domain::{Domain, Placeholder};
    pub use crate::stencil::evaluation::{Evaluation, Rule};
    pub use crate::stencil::grid::{AxisBox, Grid, HorizontalBox, LevelInterval};
    pub use crate::stencil::schedule::{ExecutionOrder, Schedule};
    pub use crate::stencil::stage::Stage;
    pub use crate::stencil_error::{Residency, StencilError};
    pub use crate::topology::{
        GridKind, GridPoint, IcosahedralTopology, LocationType, StructuredTopology, Topology,
    };
}
