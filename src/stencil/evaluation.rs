//! Rules and the evaluation context they run in.
//!
//! A [`Rule`] is the per-point update function of a stage. For every point of
//! the stage's iteration space the backend hands it an [`Evaluation`], through
//! which it reads inputs at declared offsets, reduces over mesh neighbors and
//! writes its outputs. Evaluation methods never panic on bad access under the
//! checked policy: the first fault is recorded, reads return `T::default()`,
//! and the backend aborts the run with that fault once `apply` returns.

use crate::data::{Element, StorageLayout};
use crate::stencil::accessor::{Accessor, Offset};
use crate::stencil::config::BoundsPolicy;
use crate::stencil::grid::SweepStep;
use crate::stencil_error::StencilError;
use crate::topology::location::LocationType;
use crate::topology::point::GridPoint;
use crate::topology::Topology;

/// Per-point update function of a stage.
///
/// ```rust
/// use mesh_stencil::prelude::*;
///
/// struct CopyField;
///
/// impl CopyField {
///     const IN: Accessor = Accessor::input(0, LocationType::Cell, Extent::ZERO);
///     const OUT: Accessor = Accessor::inout(1, LocationType::Cell);
/// }
///
/// impl Rule<f64> for CopyField {
///     fn accessors(&self) -> Vec<Accessor> {
///         vec![Self::IN, Self::OUT]
///     }
///
///     fn apply(&self, eval: &mut Evaluation<'_, '_, f64>) {
///         let v = eval.get(&Self::IN);
///         eval.set(&Self::OUT, v);
///     }
/// }
/// ```
pub trait Rule<T: Element>: Send + Sync {
    /// Name used in errors and logs.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Parameter slots, numbered `0..n` in order.
    fn accessors(&self) -> Vec<Accessor>;

    /// Compute the outputs at `eval.point()`.
    fn apply(&self, eval: &mut Evaluation<'_, '_, T>);
}

pub(crate) enum SlotData<'s, T> {
    Read { data: &'s [T], layout: StorageLayout },
    Write { column: usize, layout: StorageLayout },
}

pub(crate) struct SlotBinding<'s, T> {
    pub(crate) accessor: Accessor,
    pub(crate) data: SlotData<'s, T>,
}

/// Everything a lane of one stage shares with the other lanes.
pub(crate) struct StageContext<'s, T> {
    pub(crate) slots: Vec<SlotBinding<'s, T>>,
    pub(crate) topology: &'s dyn Topology,
    pub(crate) location: LocationType,
    pub(crate) bounds: BoundsPolicy,
}

/// Writable columns of one lane, one per output slot.
pub(crate) struct LaneWork<'s, T> {
    pub(crate) origin: GridPoint,
    pub(crate) columns: Vec<&'s mut [T]>,
}

/// Evaluation context of a rule at one grid point.
pub struct Evaluation<'e, 's, T: Element> {
    ctx: &'e StageContext<'s, T>,
    columns: &'e mut [&'s mut [T]],
    scratch: &'e mut Vec<GridPoint>,
    point: GridPoint,
    interval: usize,
    fault: Option<StencilError>,
}

impl<'e, 's, T: Element> Evaluation<'e, 's, T> {
    /// The point being computed.
    #[inline]
    pub fn point(&self) -> GridPoint {
        self.point
    }

    /// Position of the current level's interval in the grid's interval list.
    #[inline]
    pub fn interval(&self) -> usize {
        self.interval
    }

    /// Location type the stage iterates over.
    #[inline]
    pub fn location(&self) -> LocationType {
        self.ctx.location
    }

    /// First fault recorded at this point, if any.
    pub fn fault(&self) -> Option<&StencilError> {
        self.fault.as_ref()
    }

    /// Value of `acc` at the current point.
    #[inline]
    pub fn get(&mut self, acc: &Accessor) -> T {
        self.get_at(acc, Offset::ZERO)
    }

    /// Value of `acc` at the current point shifted by `off`.
    ///
    /// Input accessors read any offset inside their extent; inout accessors
    /// only read their own column.
    pub fn get_at(&mut self, acc: &Accessor, off: Offset) -> T {
        match self.read(acc, off) {
            Ok(v) => v,
            Err(e) => {
                self.fail(e);
                T::default()
            }
        }
    }

    /// Store `value` into `acc` at the current point.
    pub fn set(&mut self, acc: &Accessor, value: T) {
        if let Err(e) = self.write(acc, value) {
            self.fail(e);
        }
    }

    /// Fold `f` over the values of `acc` at the topology neighbors of the
    /// current point, starting from `seed`.
    ///
    /// Neighbors are those of `(stage location -> acc.location)`, visited in
    /// the provider's order.
    pub fn reduce_neighbors<A>(&mut self, acc: &Accessor, seed: A, mut f: impl FnMut(A, T) -> A) -> A {
        let ctx = self.ctx;
        let slot = match self.slot(acc) {
            Ok(s) => s,
            Err(e) => {
                self.fail(e);
                return seed;
            }
        };
        let (data, layout) = match &slot.data {
            SlotData::Read { data, layout } => (*data, *layout),
            SlotData::Write { .. } => {
                self.fail(StencilError::IncompatibleAccess {
                    slot: acc.slot,
                    reason: "written fields cannot be reduced over neighbors",
                });
                return seed;
            }
        };
        self.scratch.clear();
        if let Err(e) =
            ctx.topology
                .neighbors_into(ctx.location, slot.accessor.location, self.point, self.scratch)
        {
            self.fail(e);
            return seed;
        }

        let checked = ctx.bounds == BoundsPolicy::Checked;
        let mut acc_value = seed;
        let mut fault = None;
        for &n in self.scratch.iter() {
            let di = n.i.wrapping_sub(self.point.i) as isize;
            let dj = n.j.wrapping_sub(self.point.j) as isize;
            if checked && !slot.accessor.extent.contains(di, dj, 0) {
                fault = Some(StencilError::OffsetOutsideExtent {
                    slot: acc.slot,
                    di,
                    dj,
                    dk: 0,
                });
                break;
            }
            let idx = if checked {
                match layout.index(n) {
                    Ok(idx) => idx,
                    Err(e) => {
                        fault = Some(e);
                        break;
                    }
                }
            } else {
                layout.index_unchecked(n)
            };
            acc_value = f(acc_value, data[idx]);
        }
        if let Some(e) = fault {
            self.fail(e);
        }
        acc_value
    }

    fn slot(&self, acc: &Accessor) -> Result<&'e SlotBinding<'s, T>, StencilError> {
        let ctx: &'e StageContext<'s, T> = self.ctx;
        ctx.slots
            .get(acc.slot)
            .ok_or(StencilError::IncompatibleAccess {
                slot: acc.slot,
                reason: "slot is not declared by the rule",
            })
    }

    fn read(&self, acc: &Accessor, off: Offset) -> Result<T, StencilError> {
        let slot = self.slot(acc)?;
        let checked = self.ctx.bounds == BoundsPolicy::Checked;
        if checked && !slot.accessor.extent.contains(off.di, off.dj, off.dk) {
            return Err(StencilError::OffsetOutsideExtent {
                slot: acc.slot,
                di: off.di,
                dj: off.dj,
                dk: off.dk,
            });
        }
        match &slot.data {
            SlotData::Read { data, layout } => {
                if slot.accessor.location != self.ctx.location {
                    return Err(StencilError::IncompatibleAccess {
                        slot: acc.slot,
                        reason: "fields on another location are read through reduce_neighbors",
                    });
                }
                let outside = || StencilError::IndexOutOfRange {
                    point: self.point,
                    dims: layout.dims(),
                };
                let target = self
                    .point
                    .offset(off.di, self.point.color, off.dj, off.dk)
                    .ok_or_else(outside)?;
                let idx = if checked {
                    layout.index(target)?
                } else {
                    layout.index_unchecked(target)
                };
                Ok(data[idx])
            }
            SlotData::Write { column, layout } => {
                if off.di != 0 || off.dj != 0 {
                    return Err(StencilError::IncompatibleAccess {
                        slot: acc.slot,
                        reason: "written fields can only be read in the evaluated column",
                    });
                }
                self.point
                    .k
                    .checked_add_signed(off.dk)
                    .and_then(|k| self.columns[*column].get(k))
                    .copied()
                    .ok_or(StencilError::IndexOutOfRange {
                        point: self.point,
                        dims: layout.dims(),
                    })
            }
        }
    }

    fn write(&mut self, acc: &Accessor, value: T) -> Result<(), StencilError> {
        let slot = self.slot(acc)?;
        match &slot.data {
            SlotData::Write { column, layout } => {
                let cell = self.columns[*column].get_mut(self.point.k).ok_or(
                    StencilError::IndexOutOfRange {
                        point: self.point,
                        dims: layout.dims(),
                    },
                )?;
                *cell = value;
                Ok(())
            }
            SlotData::Read { .. } => Err(StencilError::IncompatibleAccess {
                slot: acc.slot,
                reason: "input accessors are read-only",
            }),
        }
    }

    fn fail(&mut self, e: StencilError) {
        if self.fault.is_none() {
            self.fault = Some(e);
        }
    }
}

/// Apply `rule` at every step of `sweep` in one lane.
///
/// Stops at the first faulting point.
pub(crate) fn evaluate_lane<'s, T: Element>(
    rule: &dyn Rule<T>,
    ctx: &StageContext<'s, T>,
    mut work: LaneWork<'s, T>,
    sweep: &[SweepStep],
) -> Result<(), StencilError> {
    let origin = work.origin;
    let mut scratch = Vec::new();
    let mut eval = Evaluation {
        ctx,
        columns: &mut work.columns,
        scratch: &mut scratch,
        point: origin,
        interval: 0,
        fault: None,
    };
    for step in sweep {
        eval.point = origin.at_level(step.k);
        eval.interval = step.interval;
        rule.apply(&mut eval);
        if let Some(e) = eval.fault.take() {
            log::debug!("rule `{}` faulted at {}: {e}", rule.name(), eval.point);
            return Err(e);
        }
    }
    Ok(())
}
