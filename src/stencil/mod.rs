//! Stencil composition: placeholders, accessors, rules, stages, schedules,
//! grids and the computation that ties them together.

pub mod accessor;
pub mod computation;
pub mod config;
pub mod domain;
pub mod evaluation;
pub mod grid;
pub mod schedule;
pub mod stage;

pub use accessor::{Accessor, Extent, Intent, Offset};
pub use computation::{Computation, ComputationBuilder, Lifecycle};
pub use config::{BoundsPolicy, ExecutionConfig};
pub use domain::{Domain, Placeholder};
pub use evaluation::{Evaluation, Rule};
pub use grid::{AxisBox, Grid, HorizontalBox, LevelInterval, SweepStep};
pub use schedule::{ExecutionOrder, Schedule};
pub use stage::Stage;
