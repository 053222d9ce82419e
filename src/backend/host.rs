//! Host strategy.
//!
//! `Forward` and `Backward` schedules run level-major: for each level of the
//! sweep, every stage in order over all of its lanes. `Parallel` schedules run
//! stage-major, each stage over its whole iteration space before the next.
//! Within one stage (and level) lanes go to the rayon pool when
//! [`ExecutionConfig::host_parallel`] is set.

use crate::backend::lanes::{Lane, LaneMap, dispatch_stage};
use crate::backend::{CompiledSchedule, ExecutionStrategy};
use crate::data::{Element, StorageLayout};
use crate::stencil::config::ExecutionConfig;
use crate::stencil::domain::Domain;
use crate::stencil::grid::Grid;
use crate::stencil::schedule::ExecutionOrder;
use crate::stencil_error::{Residency, StencilError};
use crate::topology::GridKind;
use crate::topology::location::LocationType;

#[derive(Clone, Copy, Debug)]
pub struct HostStrategy {
    lanes: LaneMap,
}

impl HostStrategy {
    pub fn new(kind: GridKind) -> Self {
        Self {
            lanes: LaneMap::for_kind(kind),
        }
    }
}

impl<T: Element> ExecutionStrategy<T> for HostStrategy {
    fn name(&self) -> &'static str {
        "host"
    }

    fn residency(&self) -> Residency {
        Residency::Host
    }

    fn plan_lanes(&self, grid: &Grid, location: LocationType, layout: &StorageLayout) -> Vec<Lane> {
        self.lanes.plan(grid, location, layout)
    }

    fn prepare(&self, domain: &mut Domain<T>) -> Result<(), StencilError> {
        for s in domain.storages() {
            if s.buffer().is_released() {
                return Err(StencilError::BufferReleased(s.name().to_string()));
            }
        }
        Ok(())
    }

    fn execute(
        &self,
        schedule: &CompiledSchedule<T>,
        domain: &mut Domain<T>,
        grid: &Grid,
        config: &ExecutionConfig,
    ) -> Result<(), StencilError> {
        let topology = &**grid.topology();
        let storages = domain.storages_mut();
        match schedule.order() {
            ExecutionOrder::Forward | ExecutionOrder::Backward => {
                for step in schedule.sweep() {
                    for stage in schedule.stages() {
                        dispatch_stage(
                            stage,
                            storages,
                            topology,
                            Residency::Host,
                            std::slice::from_ref(step),
                            config.bounds,
                            config.host_parallel,
                        )?;
                    }
                }
            }
            ExecutionOrder::Parallel => {
                for stage in schedule.stages() {
                    dispatch_stage(
                        stage,
                        storages,
                        topology,
                        Residency::Host,
                        schedule.sweep(),
                        config.bounds,
                        config.host_parallel,
                    )?;
                }
            }
        }
        Ok(())
    }
}
