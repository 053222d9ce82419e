//! Execution backends.
//!
//! A computation compiles its schedules once, at build time, into
//! [`CompiledSchedule`]s: every stage with the storages its slots resolve to
//! and the lanes of its iteration space. An [`ExecutionStrategy`], chosen by
//! [`strategy_for`] from the backend and the mesh family, then runs the
//! compiled schedules on every `run()`.

pub mod accelerator;
pub mod host;
pub mod lanes;

use std::fmt;

use crate::data::Element;
use crate::stencil::config::ExecutionConfig;
use crate::stencil::domain::Domain;
use crate::stencil::grid::{Grid, SweepStep};
use crate::stencil::schedule::{ExecutionOrder, Schedule};
use crate::stencil::stage::Stage;
use crate::stencil_error::{Residency, StencilError};
use crate::topology::GridKind;

pub use accelerator::AcceleratorStrategy;
pub use host::HostStrategy;
pub use lanes::Lane;

/// Where a computation executes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Backend {
    /// The calling process, optionally over the rayon pool.
    #[default]
    Host,
    /// The accelerator: kernels run against device copies.
    Accelerator,
}

impl Backend {
    /// Buffer copy this backend reads and writes.
    pub fn residency(self) -> Residency {
        match self {
            Backend::Host => Residency::Host,
            Backend::Accelerator => Residency::Device,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Host => f.write_str("host"),
            Backend::Accelerator => f.write_str("accelerator"),
        }
    }
}

/// A stage resolved against a domain and a grid.
#[derive(Debug)]
pub struct CompiledStage<T: Element> {
    stage: Stage<T>,
    slot_storages: Vec<usize>,
    lanes: Vec<Lane>,
}

impl<T: Element> CompiledStage<T> {
    pub(crate) fn new(stage: Stage<T>, slot_storages: Vec<usize>, lanes: Vec<Lane>) -> Self {
        Self {
            stage,
            slot_storages,
            lanes,
        }
    }

    pub fn stage(&self) -> &Stage<T> {
        &self.stage
    }

    /// Domain binding position of the storage behind each slot.
    pub fn slot_storages(&self) -> &[usize] {
        &self.slot_storages
    }

    /// Interior lanes, sorted by column index.
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }
}

/// A schedule resolved against a domain and a grid.
#[derive(Debug)]
pub struct CompiledSchedule<T: Element> {
    order: ExecutionOrder,
    stages: Vec<CompiledStage<T>>,
    sweep: Vec<SweepStep>,
}

impl<T: Element> CompiledSchedule<T> {
    pub(crate) fn new(schedule: &Schedule<T>, stages: Vec<CompiledStage<T>>, grid: &Grid) -> Self {
        Self {
            order: schedule.order(),
            stages,
            sweep: grid.sweep(schedule.order()),
        }
    }

    pub fn order(&self) -> ExecutionOrder {
        self.order
    }

    pub fn stages(&self) -> &[CompiledStage<T>] {
        &self.stages
    }

    /// Levels in visiting order.
    pub fn sweep(&self) -> &[SweepStep] {
        &self.sweep
    }

    /// Domain positions of every storage a stage touches, deduplicated.
    pub fn used_storages(&self) -> Vec<usize> {
        let mut used: Vec<usize> = self
            .stages
            .iter()
            .flat_map(|s| s.slot_storages.iter().copied())
            .collect();
        used.sort_unstable();
        used.dedup();
        used
    }
}

/// Runs compiled schedules on one backend.
pub trait ExecutionStrategy<T: Element>: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Buffer copy the strategy works on.
    fn residency(&self) -> Residency;

    /// Interior lanes of `location` for this strategy's mesh family.
    fn plan_lanes(
        &self,
        grid: &Grid,
        location: crate::topology::LocationType,
        layout: &crate::data::StorageLayout,
    ) -> Vec<Lane>;

    /// Stage resources before the first run.
    fn prepare(&self, domain: &mut Domain<T>) -> Result<(), StencilError>;

    /// One pass of `schedule` over the grid.
    fn execute(
        &self,
        schedule: &CompiledSchedule<T>,
        domain: &mut Domain<T>,
        grid: &Grid,
        config: &ExecutionConfig,
    ) -> Result<(), StencilError>;

    /// Release device copies, bringing fresher device data home first.
    fn teardown(&self, domain: &mut Domain<T>) -> Result<(), StencilError> {
        for s in domain.storages_mut() {
            let b = s.buffer();
            if !b.is_released() && !b.is_host_valid() && b.is_device_valid() {
                s.sync_to_host()?;
            }
            s.release_device();
        }
        Ok(())
    }
}

/// Strategy for `backend` on a `kind` mesh.
pub fn strategy_for<T: Element>(backend: Backend, kind: GridKind) -> Box<dyn ExecutionStrategy<T>> {
    log::debug!("selecting {backend} strategy for {kind:?} grid");
    match backend {
        Backend::Host => Box::new(HostStrategy::new(kind)),
        Backend::Accelerator => Box::new(AcceleratorStrategy::new(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_matches_backend() {
        let s = strategy_for::<f64>(Backend::Host, GridKind::Icosahedral);
        assert_eq!(s.residency(), Residency::Host);
        assert_eq!(s.name(), "host");
        let s = strategy_for::<f32>(Backend::Accelerator, GridKind::Structured);
        assert_eq!(s.residency(), Residency::Device);
        assert_eq!(s.name(), "accelerator");
        assert_eq!(Backend::default(), Backend::Host);
    }
}
