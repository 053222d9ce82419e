//! Execution configuration of a computation.

use serde::{Deserialize, Serialize};

/// How evaluation contexts police reads.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum BoundsPolicy {
    /// Every read is checked against the accessor extent and the storage
    /// bounds; violations abort the run with an error.
    #[default]
    Checked,
    /// Offsets are not checked against extents. Reads that leave the whole
    /// buffer still panic; reads that stay inside it return whatever element
    /// lies at the computed index.
    Unchecked,
}

/// Knobs passed to [`ComputationBuilder::config`](crate::stencil::computation::ComputationBuilder::config).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub bounds: BoundsPolicy,
    /// Run independent lanes on the rayon pool on the host backend. Ignored
    /// without the `rayon` feature.
    pub host_parallel: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            bounds: BoundsPolicy::Checked,
            host_parallel: true,
        }
    }
}

impl ExecutionConfig {
    pub fn with_bounds(mut self, bounds: BoundsPolicy) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_host_parallel(mut self, on: bool) -> Self {
        self.host_parallel = on;
        self
    }
}
