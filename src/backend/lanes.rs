//! Lane planning and per-stage dispatch shared by both strategies.
//!
//! A lane is one column `(i, color, j)` of the stage location. Because the
//! vertical level is the fastest-varying index, a lane is a contiguous slice
//! of every storage on that location, so each lane gets its own `&mut` slice
//! of every output and lanes can run concurrently without synchronization.

use itertools::iproduct;

use crate::data::{Element, Storage, StorageLayout};
use crate::stencil::config::BoundsPolicy;
use crate::stencil::evaluation::{LaneWork, SlotBinding, SlotData, StageContext, evaluate_lane};
use crate::stencil::grid::{Grid, SweepStep};
use crate::stencil_error::{Residency, StencilError};
use crate::topology::location::LocationType;
use crate::topology::point::GridPoint;
use crate::topology::{GridKind, Topology};

use super::CompiledStage;

/// One column of a stage's iteration space.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Lane {
    /// Column index under the storage layout.
    pub index: usize,
    /// Grid point of the column at level 0.
    pub origin: GridPoint,
}

/// How a mesh family's colors map to lanes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LaneMap {
    /// One color per location; the color loop collapses.
    SingleColor,
    /// Every color of the location, each with its own box.
    PerColor,
}

impl LaneMap {
    pub(crate) fn for_kind(kind: GridKind) -> Self {
        match kind {
            GridKind::Structured => LaneMap::SingleColor,
            GridKind::Icosahedral => LaneMap::PerColor,
        }
    }

    /// Interior lanes of `location`, sorted by column index.
    pub(crate) fn plan(self, grid: &Grid, location: LocationType, layout: &StorageLayout) -> Vec<Lane> {
        let colors = match self {
            LaneMap::SingleColor => layout.n_colors().min(1),
            LaneMap::PerColor => layout.n_colors(),
        };
        let mut lanes = Vec::new();
        for color in 0..colors {
            let bx = grid.box_for(location, color);
            for (i, j) in iproduct!(bx.i.interior(), bx.j.interior()) {
                let origin = GridPoint::new(i, color, j, 0);
                lanes.push(Lane {
                    index: layout.lane_of(origin),
                    origin,
                });
            }
        }
        lanes.sort_unstable_by_key(|l| l.index);
        lanes
    }
}

/// The columns of `data` belonging to `lanes` (sorted), in lane order.
fn select_columns<'a, T>(data: &'a mut [T], levels: usize, lanes: &[Lane]) -> Vec<&'a mut [T]> {
    let mut wanted = lanes.iter().map(|l| l.index).peekable();
    data.chunks_mut(levels)
        .enumerate()
        .filter_map(|(idx, column)| {
            if wanted.peek() == Some(&idx) {
                wanted.next();
                Some(column)
            } else {
                None
            }
        })
        .collect()
}

/// Run one stage over `sweep` in every lane, against the `side` copies.
pub(crate) fn dispatch_stage<T: Element>(
    compiled: &CompiledStage<T>,
    storages: &mut [Storage<T>],
    topology: &dyn Topology,
    side: Residency,
    sweep: &[SweepStep],
    bounds: BoundsPolicy,
    parallel: bool,
) -> Result<(), StencilError> {
    let lanes = compiled.lanes();
    if lanes.is_empty() || sweep.is_empty() {
        return Ok(());
    }
    let stage = compiled.stage();

    let mut role = vec![None; storages.len()];
    for (slot, &pos) in compiled.slot_storages().iter().enumerate() {
        role[pos] = Some(slot);
    }
    let mut bindings: Vec<Option<SlotBinding<'_, T>>> =
        (0..compiled.slot_storages().len()).map(|_| None).collect();
    let mut outputs: Vec<Vec<&mut [T]>> = Vec::new();
    for (storage, role) in storages.iter_mut().zip(role) {
        let Some(slot) = role else { continue };
        let accessor = stage.bindings()[slot].1;
        let layout = *storage.layout();
        if accessor.is_writable() {
            let name = storage.name().to_string();
            let columns = select_columns(storage.view_mut(side)?, layout.levels(), lanes);
            if columns.len() != lanes.len() {
                return Err(StencilError::DimensionMismatch {
                    name,
                    expected: [lanes.len(), 1, 1, layout.levels()],
                    found: layout.dims(),
                });
            }
            bindings[slot] = Some(SlotBinding {
                accessor,
                data: SlotData::Write {
                    column: outputs.len(),
                    layout,
                },
            });
            outputs.push(columns);
        } else {
            bindings[slot] = Some(SlotBinding {
                accessor,
                data: SlotData::Read {
                    data: storage.view(side)?,
                    layout,
                },
            });
        }
    }

    let mut slots = Vec::with_capacity(bindings.len());
    for (slot, binding) in bindings.into_iter().enumerate() {
        slots.push(binding.ok_or(StencilError::UnboundPlaceholder(stage.bindings()[slot].0.id()))?);
    }

    let mut per_lane: Vec<Vec<&mut [T]>> = lanes
        .iter()
        .map(|_| Vec::with_capacity(outputs.len()))
        .collect();
    for columns in outputs {
        for (lane_columns, column) in per_lane.iter_mut().zip(columns) {
            lane_columns.push(column);
        }
    }
    let work: Vec<LaneWork<'_, T>> = per_lane
        .into_iter()
        .zip(lanes)
        .map(|(columns, lane)| LaneWork {
            origin: lane.origin,
            columns,
        })
        .collect();

    let ctx = StageContext {
        slots,
        topology,
        location: stage.location(),
        bounds,
    };
    let rule = stage.rule();
    run_lanes(work, parallel, |w| evaluate_lane(rule, &ctx, w, sweep))
}

#[cfg(feature = "rayon")]
fn run_lanes<W, F>(work: Vec<W>, parallel: bool, f: F) -> Result<(), StencilError>
where
    W: Send,
    F: Fn(W) -> Result<(), StencilError> + Send + Sync,
{
    use rayon::prelude::*;
    if parallel {
        work.into_par_iter().try_for_each(f)
    } else {
        work.into_iter().try_for_each(f)
    }
}

#[cfg(not(feature = "rayon"))]
fn run_lanes<W, F>(work: Vec<W>, _parallel: bool, f: F) -> Result<(), StencilError>
where
    F: Fn(W) -> Result<(), StencilError>,
{
    work.into_iter().try_for_each(f)
}
