#![allow(dead_code)]
use std::sync::Arc;

use mesh_stencil::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub fn icosahedral(d1: usize, d2: usize, d3: usize) -> Arc<dyn Topology> {
    Arc::new(IcosahedralTopology::new(d1, d2, d3))
}

pub fn structured(d1: usize, d2: usize, d3: usize) -> Arc<dyn Topology> {
    Arc::new(StructuredTopology::new(d1, d2, d3))
}

/// Factory on a private, unbounded device so tests do not share memory
/// accounting.
pub fn factory(topology: &Arc<dyn Topology>) -> StorageFactory {
    StorageFactory::new(topology.clone()).with_device(Device::new("test"))
}

/// Storage whose every element holds its own linear index, valid on both
/// sides.
pub fn indexed_storage(f: &StorageFactory, location: LocationType, name: &str) -> Storage<f64> {
    let mut s = f.make_storage::<f64>(location, name).unwrap();
    for (idx, v) in s.host_slice_mut().unwrap().iter_mut().enumerate() {
        *v = idx as f64;
    }
    s.sync_to_device().unwrap();
    s
}

/// Storage of uniform values in `[-1, 1)` from a fixed seed, valid on both
/// sides.
pub fn random_storage(
    f: &StorageFactory,
    location: LocationType,
    name: &str,
    seed: u64,
) -> Storage<f64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut s = f.make_storage::<f64>(location, name).unwrap();
    for v in s.host_slice_mut().unwrap() {
        *v = rng.gen_range(-1.0..1.0);
    }
    s.sync_to_device().unwrap();
    s
}

/// `out = sum of in over the (from -> to) neighbors`, seeded with 0.0.
pub struct NeighborSum {
    pub from: LocationType,
    pub to: LocationType,
}

impl NeighborSum {
    pub fn input(&self) -> Accessor {
        Accessor::input(0, self.to, Extent::horizontal(1))
    }

    pub fn output(&self) -> Accessor {
        Accessor::inout(1, self.from)
    }
}

impl Rule<f64> for NeighborSum {
    fn accessors(&self) -> Vec<Accessor> {
        vec![self.input(), self.output()]
    }

    fn apply(&self, eval: &mut Evaluation<'_, '_, f64>) {
        let s = eval.reduce_neighbors(&self.input(), 0.0, |acc, v| acc + v);
        eval.set(&self.output(), s);
    }
}

/// `out = in` on one location.
pub struct Identity {
    pub location: LocationType,
}

impl Identity {
    pub fn input(&self) -> Accessor {
        Accessor::input(0, self.location, Extent::ZERO)
    }

    pub fn output(&self) -> Accessor {
        Accessor::inout(1, self.location)
    }
}

impl Rule<f64> for Identity {
    fn accessors(&self) -> Vec<Accessor> {
        vec![self.input(), self.output()]
    }

    fn apply(&self, eval: &mut Evaluation<'_, '_, f64>) {
        let v = eval.get(&self.input());
        eval.set(&self.output(), v);
    }
}

/// Reference neighbor sum on every interior `from` point of `grid`, computed
/// by walking the topology directly. Non-interior entries stay 0.0.
pub fn brute_force_sum(
    grid: &Grid,
    from: LocationType,
    to: LocationType,
    input: &Storage<f64>,
) -> Vec<f64> {
    let topology = grid.topology();
    let dims = grid.dims();
    let colors = topology.n_colors(from).unwrap();
    let layout = StorageLayout::new(dims.d1, colors, dims.d2, dims.d3);
    let mut out = vec![0.0; layout.size()];
    for (idx, v) in out.iter_mut().enumerate() {
        let p = layout.grid_point_of(idx).unwrap();
        if !grid.in_interior(from, p) {
            continue;
        }
        *v = topology
            .neighbors_of(from, to, p)
            .unwrap()
            .into_iter()
            .map(|n| input.get(n).unwrap())
            .sum();
    }
    out
}

/// Compare `actual` against `reference` on the points of `location` at least
/// `halos = [hi, hj]` away from the mesh boundary, on the levels of the
/// grid's intervals.
pub fn verify(
    grid: &Grid,
    location: LocationType,
    reference: &[f64],
    actual: &Storage<f64>,
    halos: [usize; 2],
    tolerance: f64,
) -> bool {
    assert_eq!(actual.location(), location);
    let dims = grid.dims();
    let values = actual.host_slice().unwrap();
    if values.len() != reference.len() {
        eprintln!("length mismatch: {} vs {}", values.len(), reference.len());
        return false;
    }
    for (idx, (&want, &got)) in reference.iter().zip(values).enumerate() {
        let p = actual.grid_point_of(idx).unwrap();
        let inside = p.i >= halos[0]
            && p.i + halos[0] < dims.d1
            && p.j >= halos[1]
            && p.j + halos[1] < dims.d2
            && grid.intervals().iter().any(|iv| iv.contains(p.k));
        if inside && (want - got).abs() > tolerance {
            eprintln!("mismatch at {p}: expected {want}, got {got}");
            return false;
        }
    }
    true
}

/// Build, ready and steady a computation running `schedules` in order.
pub fn prepared(
    domain: Domain<f64>,
    grid: Grid,
    backend: Backend,
    schedules: Vec<Schedule<f64>>,
) -> Computation<f64> {
    let mut builder = Computation::builder(domain, grid).backend(backend);
    for s in schedules {
        builder = builder.schedule(s);
    }
    let mut c = builder.build().unwrap();
    c.ready().unwrap();
    c.steady().unwrap();
    c
}
