//! Computation: a validated domain + grid + schedule set and its lifecycle.
//!
//! ```text
//! Built --ready()--> Ready --steady()--> Steady --run()--> Steady ...
//!   \                  \                   \
//!    `-----------------`-------------------`--finalize()--> Finalized
//! ```
//!
//! `ready()` and `steady()` are no-ops when repeated. `run()` is only legal in
//! `Steady`; `finalize()` is terminal and idempotent.

use std::time::{Duration, Instant};

use crate::backend::{Backend, CompiledSchedule, CompiledStage, ExecutionStrategy, strategy_for};
use crate::data::{Element, Storage, StorageLayout};
use crate::stencil::config::ExecutionConfig;
use crate::stencil::domain::{Domain, Placeholder};
use crate::stencil::grid::Grid;
use crate::stencil::schedule::Schedule;
use crate::stencil::stage::Stage;
use crate::stencil_error::StencilError;

/// Lifecycle state of a [`Computation`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Lifecycle {
    /// Validated, nothing staged or executed.
    Built,
    /// Resources staged.
    Ready,
    /// Setup frozen; `run()` allowed.
    Steady,
    /// Resources released; terminal.
    Finalized,
}

/// Collects the parts of a computation; [`build`](Self::build) validates them.
pub struct ComputationBuilder<T: Element> {
    domain: Domain<T>,
    grid: Grid,
    backend: Backend,
    schedules: Vec<Schedule<T>>,
    config: ExecutionConfig,
}

impl<T: Element> ComputationBuilder<T> {
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Append a schedule; schedules run in the order they are added.
    pub fn schedule(mut self, schedule: Schedule<T>) -> Self {
        self.schedules.push(schedule);
        self
    }

    pub fn config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate every stage against the domain and the grid and compile the
    /// schedules for the selected backend.
    ///
    /// # Errors
    /// - `EmptySchedule` without schedules.
    /// - `UnsupportedLocation` / `UnsupportedRelation` for locations or
    ///   neighbor relations the topology does not provide.
    /// - `UnboundPlaceholder` / `LocationMismatch` for stage arguments the
    ///   domain does not bind as declared.
    /// - `DimensionMismatch` if a storage is not sized for the grid's mesh.
    /// - `InvalidExtent` if a reduction source's extent is smaller than the
    ///   relation's neighbor radius.
    /// - `ExtentExceedsHalo` if an extent reaches past the halo of a box.
    pub fn build(self) -> Result<Computation<T>, StencilError> {
        let Self {
            domain,
            grid,
            backend,
            schedules,
            config,
        } = self;
        if schedules.is_empty() {
            return Err(StencilError::EmptySchedule);
        }
        let strategy = strategy_for::<T>(backend, grid.topology().kind());

        let mut compiled = Vec::with_capacity(schedules.len());
        for schedule in &schedules {
            let mut stages = Vec::with_capacity(schedule.len());
            for stage in schedule.stages() {
                stages.push(compile_stage(stage, &domain, &grid, &*strategy)?);
            }
            compiled.push(CompiledSchedule::new(schedule, stages, &grid));
        }

        if !grid.default_box().has_halo() {
            log::warn!("grid has no horizontal halo; stages can only read at their own column");
        }
        log::info!(
            "built {} computation: {} schedules, {} stages, {} storages",
            backend,
            compiled.len(),
            compiled.iter().map(|s| s.stages().len()).sum::<usize>(),
            domain.len()
        );
        Ok(Computation {
            domain,
            grid,
            schedules: compiled,
            strategy,
            backend,
            config,
            state: Lifecycle::Built,
            runs: 0,
            elapsed: Duration::ZERO,
        })
    }
}

fn compile_stage<T: Element>(
    stage: &Stage<T>,
    domain: &Domain<T>,
    grid: &Grid,
    strategy: &dyn ExecutionStrategy<T>,
) -> Result<CompiledStage<T>, StencilError> {
    let topology = grid.topology();
    let dims = grid.dims();
    let location = stage.location();
    let layout_of = |loc| {
        topology
            .n_colors(loc)
            .map(|colors| StorageLayout::new(dims.d1, colors, dims.d2, dims.d3))
            .ok_or(StencilError::UnsupportedLocation(loc))
    };
    let layout = layout_of(location)?;

    let mut slots = Vec::with_capacity(stage.bindings().len());
    for (p, acc) in stage.bindings() {
        let storage = domain.storage(p)?;
        let expected = layout_of(acc.location)?;
        if storage.dims() != expected.dims() {
            return Err(StencilError::DimensionMismatch {
                name: storage.name().to_string(),
                expected: expected.dims(),
                found: storage.dims(),
            });
        }
        if acc.location != location {
            let (ri, rj) = topology
                .neighbor_radius(location, acc.location)
                .ok_or(StencilError::UnsupportedRelation {
                    from: location,
                    to: acc.location,
                })?;
            if !acc.extent.covers_horizontal(ri, rj) {
                return Err(StencilError::InvalidExtent {
                    slot: acc.slot,
                    reason: "extent is smaller than the neighbor radius of the relation",
                });
            }
        }
        for color in 0..layout.n_colors() {
            let bx = grid.box_for(location, color);
            if bx.is_empty() {
                continue;
            }
            let e = &acc.extent;
            if bx.i.halo_minus() < e.i_minus
                || bx.i.halo_plus() < e.i_plus
                || bx.j.halo_minus() < e.j_minus
                || bx.j.halo_plus() < e.j_plus
            {
                return Err(StencilError::ExtentExceedsHalo {
                    placeholder: p.id(),
                    location,
                });
            }
        }
        slots.push(
            domain
                .position(p.id())
                .ok_or(StencilError::UnboundPlaceholder(p.id()))?,
        );
    }

    let lanes = strategy.plan_lanes(grid, location, &layout);
    log::debug!(
        "compiled stage `{}` on {location}: {} lanes",
        stage.name(),
        lanes.len()
    );
    Ok(CompiledStage::new(stage.clone(), slots, lanes))
}

/// A compiled, executable set of schedules over one domain and grid.
pub struct Computation<T: Element> {
    domain: Domain<T>,
    grid: Grid,
    schedules: Vec<CompiledSchedule<T>>,
    strategy: Box<dyn ExecutionStrategy<T>>,
    backend: Backend,
    config: ExecutionConfig,
    state: Lifecycle,
    runs: u64,
    elapsed: Duration,
}

impl<T: Element> std::fmt::Debug for Computation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computation")
            .field("backend", &self.backend)
            .field("state", &self.state)
            .field("schedules", &self.schedules.len())
            .field("runs", &self.runs)
            .finish()
    }
}

impl<T: Element> Computation<T> {
    /// Start building a computation over `domain` and `grid`, on the host
    /// with the default configuration.
    pub fn builder(domain: Domain<T>, grid: Grid) -> ComputationBuilder<T> {
        ComputationBuilder {
            domain,
            grid,
            backend: Backend::default(),
            schedules: Vec::new(),
            config: ExecutionConfig::default(),
        }
    }

    /// Stage resources. On the accelerator this fails if any storage lacks a
    /// device copy, and uploads host data whose device copy is stale.
    pub fn ready(&mut self) -> Result<(), StencilError> {
        match self.state {
            Lifecycle::Built => {
                self.strategy.prepare(&mut self.domain)?;
                self.state = Lifecycle::Ready;
                log::info!("computation ready on {}", self.strategy.name());
                Ok(())
            }
            Lifecycle::Ready | Lifecycle::Steady => Ok(()),
            Lifecycle::Finalized => Err(self.invalid("ready")),
        }
    }

    /// Freeze the setup; afterwards `run()` may be called any number of times.
    pub fn steady(&mut self) -> Result<(), StencilError> {
        match self.state {
            Lifecycle::Ready => {
                self.state = Lifecycle::Steady;
                log::info!("computation steady");
                Ok(())
            }
            Lifecycle::Steady => Ok(()),
            Lifecycle::Built | Lifecycle::Finalized => Err(self.invalid("steady")),
        }
    }

    /// Execute every schedule once, in order.
    ///
    /// # Errors
    /// `InvalidTransition` outside `Steady` (nothing runs), `StaleBuffer` if a
    /// used storage is stale on the backend's side (nothing runs), or the
    /// first fault raised by a rule.
    pub fn run(&mut self) -> Result<(), StencilError> {
        if self.state != Lifecycle::Steady {
            return Err(self.invalid("run"));
        }
        let side = self.strategy.residency();
        for schedule in &self.schedules {
            for pos in schedule.used_storages() {
                self.domain.storages()[pos].buffer().view(side)?;
            }
        }
        let start = Instant::now();
        for schedule in &self.schedules {
            self.strategy
                .execute(schedule, &mut self.domain, &self.grid, &self.config)?;
        }
        self.runs += 1;
        self.elapsed += start.elapsed();
        Ok(())
    }

    /// Release device copies, first copying fresher device data back to the
    /// host. Host data stays readable. Terminal; repeated calls do nothing.
    pub fn finalize(&mut self) -> Result<(), StencilError> {
        if self.state == Lifecycle::Finalized {
            return Ok(());
        }
        self.strategy.teardown(&mut self.domain)?;
        self.state = Lifecycle::Finalized;
        log::info!("computation finalized: {}", self.meter());
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> StencilError {
        StencilError::InvalidTransition {
            action,
            state: self.state,
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn schedules(&self) -> &[CompiledSchedule<T>] {
        &self.schedules
    }

    /// Completed `run()` calls.
    pub fn run_count(&self) -> u64 {
        self.runs
    }

    /// Wall time spent in completed `run()` calls.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// One-line summary of runs and run time.
    pub fn meter(&self) -> String {
        let per_run = mean_run_time(self.elapsed, self.runs);
        format!(
            "{} backend: {} runs, {:.6}s total, {:.6}s per run",
            self.backend,
            self.runs,
            self.elapsed.as_secs_f64(),
            per_run.as_secs_f64()
        )
    }

    pub fn print_meter(&self) {
        println!("{}", self.meter());
    }

    pub fn domain(&self) -> &Domain<T> {
        &self.domain
    }

    pub fn domain_mut(&mut self) -> &mut Domain<T> {
        &mut self.domain
    }

    pub fn storage(&self, p: &Placeholder) -> Result<&Storage<T>, StencilError> {
        self.domain.storage(p)
    }

    pub fn storage_mut(&mut self, p: &Placeholder) -> Result<&mut Storage<T>, StencilError> {
        self.domain.storage_mut(p)
    }

    /// Give the domain back, e.g. to inspect results after `finalize()`.
    pub fn into_domain(self) -> Domain<T> {
        self.domain
    }
}

fn mean_run_time(elapsed: Duration, runs: u64) -> Duration {
    if runs == 0 {
        Duration::ZERO
    } else {
        elapsed.div_f64(runs as f64)
    }
}
