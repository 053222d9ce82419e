mod util;
use util::*;

use std::sync::Arc;

use mesh_stencil::prelude::*;
use serial_test::serial;

const CELL: LocationType = LocationType::Cell;
const EDGE: LocationType = LocationType::Edge;

/// `out(k) = sum of tmp over the cell's edges + out(k-1)`; the lowest level
/// interval (`seed`) starts the accumulation from zero.
struct AccumulateEdges {
    seed: usize,
}

impl AccumulateEdges {
    const TMP: Accessor = Accessor::input(0, EDGE, Extent::horizontal(1));
    const OUT: Accessor = Accessor::inout(1, CELL).with_extent(Extent::vertical(1, 0));
}

impl Rule<f64> for AccumulateEdges {
    fn accessors(&self) -> Vec<Accessor> {
        vec![Self::TMP, Self::OUT]
    }

    fn apply(&self, eval: &mut Evaluation<'_, '_, f64>) {
        let s = eval.reduce_neighbors(&Self::TMP, 0.0, |a, v| a + v);
        let below = if eval.interval() == self.seed {
            0.0
        } else {
            eval.get_at(&Self::OUT, Offset::k(-1))
        };
        eval.set(&Self::OUT, s + below);
    }
}

/// Edge gather of a random cell field followed by a forward accumulation on
/// cells, on the requested backend. Returns the final cell field.
fn two_stage_forward(topology: &Arc<dyn Topology>, backend: Backend) -> Result<Vec<f64>, StencilError> {
    let f = factory(topology);
    let p_in = Placeholder::new(0, CELL);
    let p_tmp = Placeholder::new(1, EDGE);
    let p_out = Placeholder::new(2, CELL);
    let domain = Domain::bind([
        (p_in, random_storage(&f, CELL, "in", 42)),
        (p_tmp, f.make_storage(EDGE, "tmp")?),
        (p_out, f.make_storage(CELL, "out")?),
    ])?;
    let levels = topology.dims().d3;
    let grid = Grid::with_halo(topology.clone(), 1)?.with_intervals(vec![
        LevelInterval::new(1, levels - 1)?,
        LevelInterval::new(0, 0)?,
    ])?;
    let gather = Stage::new(NeighborSum { from: EDGE, to: CELL }, EDGE, [p_in, p_tmp])?;
    let accumulate = Stage::new(AccumulateEdges { seed: 1 }, CELL, [p_tmp, p_out])?;
    let schedule = Schedule::new(ExecutionOrder::Forward, vec![gather, accumulate])?;
    let mut c = prepared(domain, grid, backend, vec![schedule]);
    c.run()?;
    c.finalize()?;
    Ok(c.storage(&p_out)?.host_slice()?.to_vec())
}

#[test]
fn host_and_accelerator_agree_on_a_forward_schedule() -> Result<(), Box<dyn std::error::Error>> {
    let topology = icosahedral(7, 6, 5);
    let host = two_stage_forward(&topology, Backend::Host)?;
    let device = two_stage_forward(&topology, Backend::Accelerator)?;
    assert_eq!(host, device);
    assert!(host.iter().any(|&v| v != 0.0));
    Ok(())
}

#[test]
fn accelerator_result_stays_on_device_until_synced() -> Result<(), Box<dyn std::error::Error>> {
    let topology = icosahedral(4, 4, 3);
    let f = factory(&topology);
    let p_in = Placeholder::new(0, EDGE);
    let p_out = Placeholder::new(1, EDGE);
    let domain = Domain::bind([
        (p_in, random_storage(&f, EDGE, "in", 3)),
        (p_out, f.make_storage(EDGE, "out")?),
    ])?;
    let grid = Grid::with_halo(topology.clone(), 0)?;
    let stage = Stage::new(Identity { location: EDGE }, EDGE, [p_in, p_out])?;
    let mut c = prepared(
        domain,
        grid,
        Backend::Accelerator,
        vec![Schedule::new(ExecutionOrder::Parallel, vec![stage])?],
    );
    c.run()?;

    assert!(matches!(
        c.storage(&p_out)?.host_slice(),
        Err(StencilError::StaleBuffer { side: Residency::Host, .. })
    ));
    c.storage_mut(&p_out)?.sync_to_host()?;
    let input = c.storage(&p_in)?.host_slice()?.to_vec();
    assert_eq!(c.storage(&p_out)?.host_slice()?, &input[..]);
    Ok(())
}

#[test]
fn finalize_copies_device_results_back() -> Result<(), Box<dyn std::error::Error>> {
    let topology = icosahedral(5, 5, 2);
    let f = factory(&topology);
    let p_in = Placeholder::new(0, CELL);
    let p_out = Placeholder::new(1, CELL);
    let domain = Domain::bind([
        (p_in, indexed_storage(&f, CELL, "in")),
        (p_out, f.make_storage(CELL, "out")?),
    ])?;
    let stage = Stage::new(NeighborSum { from: CELL, to: CELL }, CELL, [p_in, p_out])?;
    let mut c = prepared(
        domain,
        Grid::with_halo(topology.clone(), 1)?,
        Backend::Accelerator,
        vec![Schedule::new(ExecutionOrder::Parallel, vec![stage])?],
    );
    c.run()?;
    c.finalize()?;
    assert_eq!(c.state(), Lifecycle::Finalized);

    let reference = brute_force_sum(c.grid(), CELL, CELL, c.storage(&p_in)?);
    assert!(verify(c.grid(), CELL, &reference, c.storage(&p_out)?, [1, 1], 1e-10));
    assert!(!c.storage(&p_out)?.buffer().is_device_valid());
    Ok(())
}

#[test]
fn stale_device_copy_blocks_run() -> Result<(), Box<dyn std::error::Error>> {
    let topology = icosahedral(4, 4, 2);
    let f = factory(&topology);
    let p_in = Placeholder::new(0, CELL);
    let p_out = Placeholder::new(1, CELL);
    let domain = Domain::bind([
        (p_in, indexed_storage(&f, CELL, "in")),
        (p_out, f.make_storage(CELL, "out")?),
    ])?;
    let stage = Stage::new(Identity { location: CELL }, CELL, [p_in, p_out])?;
    let mut c = prepared(
        domain,
        Grid::with_halo(topology.clone(), 0)?,
        Backend::Accelerator,
        vec![Schedule::new(ExecutionOrder::Parallel, vec![stage])?],
    );

    c.storage_mut(&p_in)?.set([1, 0, 1, 0], -5.0)?;
    let err = c.run().unwrap_err();
    assert!(matches!(
        err,
        StencilError::StaleBuffer { ref name, side: Residency::Device } if name == "in"
    ));
    assert_eq!(c.run_count(), 0);

    c.storage_mut(&p_in)?.sync_to_device()?;
    c.run()?;
    c.storage_mut(&p_out)?.sync_to_host()?;
    assert_eq!(c.storage(&p_out)?.get([1, 0, 1, 0])?, -5.0);
    Ok(())
}

#[test]
fn ready_uploads_host_edits_made_before_it() -> Result<(), Box<dyn std::error::Error>> {
    let topology = icosahedral(3, 3, 1);
    let f = factory(&topology);
    let p_in = Placeholder::new(0, CELL);
    let p_out = Placeholder::new(1, CELL);
    let mut input = f.make_storage::<f64>(CELL, "in")?;
    input.initialize(2.5)?;
    assert!(!input.buffer().is_device_valid());
    let domain = Domain::bind([(p_in, input), (p_out, f.make_storage(CELL, "out")?)])?;
    let stage = Stage::new(Identity { location: CELL }, CELL, [p_in, p_out])?;
    let mut c = prepared(
        domain,
        Grid::with_halo(topology.clone(), 0)?,
        Backend::Accelerator,
        vec![Schedule::new(ExecutionOrder::Parallel, vec![stage])?],
    );
    c.run()?;
    c.finalize()?;
    assert!(c.storage(&p_out)?.host_slice()?.iter().all(|&v| v == 2.5));
    Ok(())
}

#[test]
fn device_capacity_failure_surfaces_at_ready() -> Result<(), Box<dyn std::error::Error>> {
    let topology = icosahedral(8, 8, 4);
    let small = Device::with_capacity("small", 1024);
    let f = StorageFactory::new(topology.clone()).with_device(small.clone());
    let p_in = Placeholder::new(0, CELL);
    let p_out = Placeholder::new(1, CELL);
    let build = |backend: Backend| -> Result<Computation<f64>, StencilError> {
        let domain = Domain::bind([
            (p_in, f.make_storage(CELL, "in")?),
            (p_out, f.make_storage(CELL, "out")?),
        ])?;
        let stage = Stage::new(Identity { location: CELL }, CELL, [p_in, p_out])?;
        Computation::builder(domain, Grid::with_halo(topology.clone(), 0)?)
            .backend(backend)
            .schedule(Schedule::new(ExecutionOrder::Parallel, vec![stage])?)
            .build()
    };

    let mut device = build(Backend::Accelerator)?;
    assert!(matches!(
        device.ready(),
        Err(StencilError::DeviceAllocation { .. })
    ));
    assert_eq!(device.state(), Lifecycle::Built);

    // The host backend never touches device copies.
    let mut host = build(Backend::Host)?;
    host.ready()?;
    host.steady()?;
    host.run()?;
    assert!(small.allocated_bytes() <= 1024);
    Ok(())
}

#[test]
fn released_storage_fails_ready() -> Result<(), Box<dyn std::error::Error>> {
    let topology = icosahedral(3, 3, 1);
    let f = factory(&topology);
    let p_in = Placeholder::new(0, CELL);
    let p_out = Placeholder::new(1, CELL);
    for backend in [Backend::Host, Backend::Accelerator] {
        let mut gone = f.make_storage::<f64>(CELL, "in")?;
        gone.release();
        let domain = Domain::bind([(p_in, gone), (p_out, f.make_storage(CELL, "out")?)])?;
        let stage = Stage::new(Identity { location: CELL }, CELL, [p_in, p_out])?;
        let mut c = Computation::builder(domain, Grid::with_halo(topology.clone(), 0)?)
            .backend(backend)
            .schedule(Schedule::new(ExecutionOrder::Parallel, vec![stage])?)
            .build()?;
        assert!(
            matches!(c.ready(), Err(StencilError::BufferReleased(ref n)) if n == "in"),
            "{backend}"
        );
    }
    Ok(())
}

#[test]
#[serial]
fn factories_share_the_default_device() -> Result<(), Box<dyn std::error::Error>> {
    let topology = icosahedral(4, 4, 2);
    let a = StorageFactory::new(topology.clone());
    let b = StorageFactory::new(topology);
    assert!(a.device().same_device(b.device()));
    assert!(a.device().same_device(&Device::default_device()));

    let before = a.device().allocated_bytes();
    let s = a.make_storage::<f64>(EDGE, "e")?;
    let bytes = s.len() * std::mem::size_of::<f64>();
    assert_eq!(b.device().allocated_bytes(), before + bytes);
    drop(s);
    assert_eq!(b.device().allocated_bytes(), before);
    Ok(())
}

#[test]
#[serial]
fn default_device_runs_the_accelerator() -> Result<(), Box<dyn std::error::Error>> {
    let topology = icosahedral(5, 4, 2);
    let f = StorageFactory::new(topology.clone());
    let p_in = Placeholder::new(0, CELL);
    let p_out = Placeholder::new(1, EDGE);
    let domain = Domain::bind([
        (p_in, indexed_storage(&f, CELL, "in")),
        (p_out, f.make_storage(EDGE, "out")?),
    ])?;
    let stage = Stage::new(NeighborSum { from: EDGE, to: CELL }, EDGE, [p_in, p_out])?;
    let mut c = prepared(
        domain,
        Grid::with_halo(topology.clone(), 1)?,
        Backend::Accelerator,
        vec![Schedule::new(ExecutionOrder::Parallel, vec![stage])?],
    );
    c.run()?;
    c.finalize()?;
    let reference = brute_force_sum(c.grid(), EDGE, CELL, c.storage(&p_in)?);
    assert!(verify(c.grid(), EDGE, &reference, c.storage(&p_out)?, [1, 1], 1e-10));
    Ok(())
}
