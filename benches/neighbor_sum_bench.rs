use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mesh_stencil::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const CELL: LocationType = LocationType::Cell;
const EDGE: LocationType = LocationType::Edge;

/// Edge field summed onto cells.
struct CellFromEdges;

impl CellFromEdges {
    const IN: Accessor = Accessor::input(0, EDGE, Extent::horizontal(1));
    const OUT: Accessor = Accessor::inout(1, CELL);
}

impl Rule<f64> for CellFromEdges {
    fn accessors(&self) -> Vec<Accessor> {
        vec![Self::IN, Self::OUT]
    }

    fn apply(&self, eval: &mut Evaluation<'_, '_, f64>) {
        let s = eval.reduce_neighbors(&Self::IN, 0.0, |a, v| a + v);
        eval.set(&Self::OUT, s);
    }
}

fn computation(n: usize, levels: usize, backend: Backend, parallel: bool) -> Computation<f64> {
    let topology: Arc<dyn Topology> = Arc::new(IcosahedralTopology::new(n, n, levels));
    let f = StorageFactory::new(topology.clone()).with_device(Device::new("bench"));
    let mut input = f.make_storage::<f64>(EDGE, "in").unwrap();
    let mut rng = SmallRng::seed_from_u64(42);
    for v in input.host_slice_mut().unwrap() {
        *v = rng.r#gen::<f64>();
    }
    input.sync_to_device().unwrap();

    let p_in = Placeholder::new(0, EDGE);
    let p_out = Placeholder::new(1, CELL);
    let domain = Domain::bind([(p_in, input), (p_out, f.make_storage(CELL, "out").unwrap())]).unwrap();
    let stage = Stage::new(CellFromEdges, CELL, [p_in, p_out]).unwrap();
    let mut c = Computation::builder(domain, Grid::with_halo(topology, 1).unwrap())
        .backend(backend)
        .config(ExecutionConfig::default().with_host_parallel(parallel))
        .schedule(Schedule::new(ExecutionOrder::Parallel, vec![stage]).unwrap())
        .build()
        .unwrap();
    c.ready().unwrap();
    c.steady().unwrap();
    c
}

fn bench_neighbor_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("cell_from_edges");
    for &n in &[32usize, 64, 128] {
        let levels = 40;
        for (label, backend, parallel) in [
            ("host-serial", Backend::Host, false),
            ("host-parallel", Backend::Host, true),
            ("accelerator", Backend::Accelerator, true),
        ] {
            let mut comp = computation(n, levels, backend, parallel);
            group.bench_with_input(BenchmarkId::new(label, n), &n, |b, _| {
                b.iter(|| comp.run().unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_neighbor_sum);
criterion_main!(benches);
