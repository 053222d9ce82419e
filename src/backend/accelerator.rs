//! Accelerator strategy.
//!
//! One kernel launch per stage, with a barrier between launches. Each launch
//! runs one logical lane per interior column `(i, color, j)`; the lane walks
//! the schedule's levels in order against the device copies captured for the
//! launch. Lanes are spread over the rayon pool.
//!
//! [`prepare`](ExecutionStrategy::prepare) fails if any bound storage has no
//! device copy, and pushes host data to the device for storages whose device
//! copy is stale.

use crate::backend::lanes::{Lane, LaneMap, dispatch_stage};
use crate::backend::{CompiledSchedule, ExecutionStrategy};
use crate::data::{Element, StorageLayout};
use crate::stencil::config::ExecutionConfig;
use crate::stencil::domain::Domain;
use crate::stencil::grid::Grid;
use crate::stencil_error::{Residency, StencilError};
use crate::topology::GridKind;
use crate::topology::location::LocationType;

#[derive(Clone, Copy, Debug)]
pub struct AcceleratorStrategy {
    lanes: LaneMap,
}

impl AcceleratorStrategy {
    pub fn new(kind: GridKind) -> Self {
        Self {
            lanes: LaneMap::for_kind(kind),
        }
    }
}

impl<T: Element> ExecutionStrategy<T> for AcceleratorStrategy {
    fn name(&self) -> &'static str {
        "accelerator"
    }

    fn residency(&self) -> Residency {
        Residency::Device
    }

    fn plan_lanes(&self, grid: &Grid, location: LocationType, layout: &StorageLayout) -> Vec<Lane> {
        self.lanes.plan(grid, location, layout)
    }

    fn prepare(&self, domain: &mut Domain<T>) -> Result<(), StencilError> {
        for s in domain.storages() {
            s.device_status()?;
        }
        for s in domain.storages_mut() {
            if !s.buffer().is_device_valid() {
                log::debug!("staging `{}` on the device", s.name());
                s.sync_to_device()?;
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
        for stage in schedule.stages() {
            log::debug!(
                "launch `{}`: {} lanes x {} levels",
                stage.stage().name(),
                stage.lanes().len(),
                schedule.sweep().len()
            );
            dispatch_stage(
                stage,
                storages,
                topology,
                Residency::Device,
                schedule.sweep(),
                config.bounds,
                true,
            )?;
        }
        Ok(())
    }
}
