//! Schedules: ordered stages sharing one vertical execution order.
//!
//! Stages run in declared order with a barrier between them. Which reads are
//! legal depends on the order the levels are visited in, because the host
//! strategy interleaves stages level by level while the accelerator strategy
//! runs each stage over the whole column before the next one:
//!
//! | order      | output of an earlier stage | output of a later stage or own |
//! |------------|----------------------------|--------------------------------|
//! | `Forward`  | same or lower levels       | same or higher levels (own: lower) |
//! | `Backward` | same or higher levels      | same or lower levels (own: higher) |
//! | `Parallel` | not allowed                | own: same level                |
//!
//! Outside these rules the two strategies would disagree, so
//! [`Schedule::new`] rejects them with `VerticalDependency`. Stages of a
//! `Parallel` schedule must also be independent of each other: no stage may
//! use a placeholder another stage writes (`OrderingDependency`).

use std::collections::HashMap;

use crate::data::Element;
use crate::debug_invariants::DebugInvariants;
use crate::stencil::accessor::Extent;
use crate::stencil::domain::Placeholder;
use crate::stencil::stage::Stage;
use crate::stencil_error::StencilError;

/// Vertical traversal order of a schedule.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ExecutionOrder {
    /// Levels visited upward.
    Forward,
    /// Levels visited downward.
    Backward,
    /// Levels independent of each other.
    Parallel,
}

/// Ordered stages under one execution order.
#[derive(Clone, Debug)]
pub struct Schedule<T: Element> {
    order: ExecutionOrder,
    stages: Vec<Stage<T>>,
    writers: HashMap<Placeholder, usize>,
}

impl<T: Element> Schedule<T> {
    /// # Errors
    /// - `EmptySchedule` without stages.
    /// - `ConflictingWrites` if two stages write one placeholder.
    /// - `VerticalDependency` if a vertical read contradicts `order`.
    /// - `OrderingDependency` if a `Parallel` schedule has dependent stages.
    pub fn new(order: ExecutionOrder, stages: Vec<Stage<T>>) -> Result<Self, StencilError> {
        if stages.is_empty() {
            return Err(StencilError::EmptySchedule);
        }
        let mut writers = HashMap::new();
        for (idx, stage) in stages.iter().enumerate() {
            for (p, _) in stage.writes() {
                if let Some(first) = writers.insert(*p, idx) {
                    return Err(StencilError::ConflictingWrites {
                        placeholder: p.id(),
                        first,
                        second: idx,
                    });
                }
            }
        }
        let schedule = Self {
            order,
            stages,
            writers,
        };
        schedule.check_vertical_reads()?;
        schedule.check_parallel_independence()?;
        log::debug!(
            "schedule {:?} with {} stages: {}",
            order,
            schedule.stages.len(),
            itertools::join(schedule.stages.iter().map(Stage::name), " -> ")
        );
        Ok(schedule)
    }

    fn check_vertical_reads(&self) -> Result<(), StencilError> {
        for (reader, stage) in self.stages.iter().enumerate() {
            for (p, acc) in stage.bindings() {
                let Some(&writer) = self.writers.get(p) else {
                    continue;
                };
                if !vertical_read_allowed(self.order, reader, writer, &acc.extent) {
                    return Err(StencilError::VerticalDependency {
                        placeholder: p.id(),
                        reader,
                        writer,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_parallel_independence(&self) -> Result<(), StencilError> {
        if self.order != ExecutionOrder::Parallel {
            return Ok(());
        }
        for (reader, stage) in self.stages.iter().enumerate() {
            for (p, _) in stage.bindings() {
                match self.writers.get(p) {
                    Some(&writer) if writer != reader => {
                        return Err(StencilError::OrderingDependency {
                            placeholder: p.id(),
                            reader,
                            writer,
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    pub fn order(&self) -> ExecutionOrder {
        self.order
    }

    pub fn stages(&self) -> &[Stage<T>] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Never true; construction rejects empty schedules.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Index of the stage writing `p`.
    pub fn writer_of(&self, p: &Placeholder) -> Option<usize> {
        self.writers.get(p).copied()
    }

    /// Placeholders used by any stage, in first-use order.
    pub fn placeholders(&self) -> Vec<Placeholder> {
        self.stages
            .iter()
            .flat_map(|s| s.bindings().iter().map(|(p, _)| *p))
            .fold(Vec::new(), |mut acc, p| {
                if !acc.contains(&p) {
                    acc.push(p);
                }
                acc
            })
    }

    /// Whether stage `b` uses a placeholder stage `a` writes, i.e. `b` must
    /// see `a`'s results. Out-of-range indices never depend.
    pub fn depends(&self, a: usize, b: usize) -> bool {
        let (Some(sa), Some(sb)) = (self.stages.get(a), self.stages.get(b)) else {
            return false;
        };
        a != b && sa.writes().any(|(p, _)| sb.has_parameter(p))
    }

    /// Whether swapping stages `a` and `b` cannot change any result.
    pub fn can_reorder(&self, a: usize, b: usize) -> bool {
        !self.depends(a, b) && !self.depends(b, a)
    }
}

fn vertical_read_allowed(order: ExecutionOrder, reader: usize, writer: usize, e: &Extent) -> bool {
    use std::cmp::Ordering::*;
    match (order, writer.cmp(&reader)) {
        (ExecutionOrder::Parallel, _) => e.is_vertically_zero(),
        (ExecutionOrder::Forward, Less | Equal) => e.k_plus == 0,
        (ExecutionOrder::Forward, Greater) => e.k_minus == 0,
        (ExecutionOrder::Backward, Less | Equal) => e.k_minus == 0,
        (ExecutionOrder::Backward, Greater) => e.k_plus == 0,
    }
}

impl<T: Element> DebugInvariants for Schedule<T> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Schedule");
    }

    fn validate_invariants(&self) -> Result<(), StencilError> {
        if self.stages.is_empty() {
            return Err(StencilError::EmptySchedule);
        }
        for (p, &idx) in &self.writers {
            if !self.stages.get(idx).is_some_and(|s| s.writes_to(p)) {
                return Err(StencilError::UnboundPlaceholder(p.id()));
            }
        }
        self.check_vertical_reads()?;
        self.check_parallel_independence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stencil::accessor::{Accessor, Extent, Offset};
    use crate::stencil::evaluation::{Evaluation, Rule};
    use crate::topology::location::LocationType;

    /// `out = in` read at `extent`.
    struct Shift {
        extent: Extent,
    }

    impl Rule<f64> for Shift {
        fn accessors(&self) -> Vec<Accessor> {
            vec![
                Accessor::input(0, LocationType::Cell, self.extent),
                Accessor::inout(1, LocationType::Cell),
            ]
        }

        fn apply(&self, eval: &mut Evaluation<'_, '_, f64>) {
            let v = eval.get_at(&self.accessors()[0], Offset::ZERO);
            eval.set(&self.accessors()[1], v);
        }
    }

    const A: Placeholder = Placeholder::new(0, LocationType::Cell);
    const B: Placeholder = Placeholder::new(1, LocationType::Cell);
    const C: Placeholder = Placeholder::new(2, LocationType::Cell);

    fn stage(extent: Extent, input: Placeholder, output: Placeholder) -> Stage<f64> {
        Stage::new(Shift { extent }, LocationType::Cell, [input, output]).unwrap()
    }

    #[test]
    fn empty_schedule_is_rejected() {
        let err = Schedule::<f64>::new(ExecutionOrder::Forward, vec![]).unwrap_err();
        assert_eq!(err, StencilError::EmptySchedule);
    }

    #[test]
    fn two_writers_conflict() {
        let err = Schedule::new(
            ExecutionOrder::Parallel,
            vec![stage(Extent::ZERO, A, B), stage(Extent::ZERO, C, B)],
        )
        .unwrap_err();
        assert_eq!(err, StencilError::ConflictingWrites { placeholder: 1, first: 0, second: 1 });
    }

    #[test]
    fn dependency_analysis() {
        let s = Schedule::new(
            ExecutionOrder::Forward,
            vec![stage(Extent::horizontal(1), A, B), stage(Extent::ZERO, B, C)],
        )
        .unwrap();
        assert!(s.depends(0, 1));
        assert!(!s.depends(1, 0));
        assert!(!s.can_reorder(0, 1));
        assert!(!s.depends(0, 5));
        assert_eq!(s.writer_of(&C), Some(1));
        assert_eq!(s.placeholders(), vec![A, B, C]);

        let independent = Schedule::new(
            ExecutionOrder::Parallel,
            vec![stage(Extent::ZERO, A, B), stage(Extent::ZERO, A, C)],
        )
        .unwrap();
        assert!(independent.can_reorder(0, 1));
    }

    #[test]
    fn forward_reads_of_earlier_output_must_look_down() {
        let ok = Schedule::new(
            ExecutionOrder::Forward,
            vec![stage(Extent::ZERO, A, B), stage(Extent::vertical(1, 0), B, C)],
        );
        assert!(ok.is_ok());
        let err = Schedule::new(
            ExecutionOrder::Forward,
            vec![stage(Extent::ZERO, A, B), stage(Extent::vertical(0, 1), B, C)],
        )
        .unwrap_err();
        assert_eq!(err, StencilError::VerticalDependency { placeholder: 1, reader: 1, writer: 0 });
    }

    #[test]
    fn backward_mirrors_forward() {
        assert!(
            Schedule::new(
                ExecutionOrder::Backward,
                vec![stage(Extent::ZERO, A, B), stage(Extent::vertical(0, 1), B, C)],
            )
            .is_ok()
        );
        // the level above of a later stage's output only exists on the host
        let err = Schedule::new(
            ExecutionOrder::Backward,
            vec![stage(Extent::vertical(0, 1), C, B), stage(Extent::ZERO, A, C)],
        )
        .unwrap_err();
        assert_eq!(err, StencilError::VerticalDependency { placeholder: 2, reader: 0, writer: 1 });
    }

    #[test]
    fn parallel_forbids_vertical_reads_of_outputs() {
        let err = Schedule::new(
            ExecutionOrder::Parallel,
            vec![stage(Extent::ZERO, A, B), stage(Extent::vertical(1, 0), B, C)],
        )
        .unwrap_err();
        assert!(matches!(err, StencilError::VerticalDependency { .. }));
        // inputs nobody writes may be read anywhere
        assert!(
            Schedule::new(ExecutionOrder::Parallel, vec![stage(Extent::vertical(1, 1), A, B)]).is_ok()
        );
    }

    #[test]
    fn parallel_rejects_dependent_stages_at_any_offset() {
        for stages in [
            vec![stage(Extent::ZERO, A, B), stage(Extent::ZERO, B, C)],
            vec![stage(Extent::ZERO, B, C), stage(Extent::ZERO, A, B)],
        ] {
            let err = Schedule::new(ExecutionOrder::Parallel, stages).unwrap_err();
            assert!(matches!(err, StencilError::OrderingDependency { placeholder: 1, .. }), "{err}");
        }
        // the same stages are fine under a sweep order
        let s = Schedule::new(
            ExecutionOrder::Forward,
            vec![stage(Extent::ZERO, A, B), stage(Extent::ZERO, B, C)],
        )
        .unwrap();
        assert!(s.depends(0, 1));
    }
}
