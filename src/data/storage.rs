//! Storage: a field over one location type of a mesh.
//!
//! A `Storage` couples a [`StorageLayout`] (the index function) with a
//! [`HybridBuffer`] holding the data on the host and on the accelerator.
//! Storages are created by a [`StorageFactory`] sized from the mesh of a
//! topology provider.

use std::sync::Arc;

use crate::data::Element;
use crate::data::device::Device;
use crate::data::hybrid::HybridBuffer;
use crate::data::layout::StorageLayout;
use crate::debug_invariants::DebugInvariants;
use crate::stencil_error::{Residency, StencilError};
use crate::topology::location::LocationType;
use crate::topology::point::GridPoint;
use crate::topology::Topology;

/// Field data of element type `T` on every `(i, color, j, k)` of one location.
#[derive(Debug)]
pub struct Storage<T: Element> {
    name: String,
    location: LocationType,
    layout: StorageLayout,
    buffer: HybridBuffer<T>,
}

impl<T: Element> Storage<T> {
    /// Storage of `layout.size()` elements set to `T::default()` on host and
    /// device.
    pub fn new(
        name: impl Into<String>,
        location: LocationType,
        layout: StorageLayout,
        device: &Device,
    ) -> Self {
        let name = name.into();
        let buffer = HybridBuffer::new(name.clone(), layout.size(), T::default(), device);
        Self {
            name,
            location,
            layout,
            buffer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> LocationType {
        self.location
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// `[d1, n_colors, d2, d3]`.
    pub fn dims(&self) -> [usize; 4] {
        self.layout.dims()
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buffer(&self) -> &HybridBuffer<T> {
        &self.buffer
    }

    /// Fill the host copy with `value`; the device copy becomes stale.
    pub fn initialize(&mut self, value: T) -> Result<(), StencilError> {
        self.buffer.fill_host(value)
    }

    /// Fill both copies with `value`.
    pub fn initialize_everywhere(&mut self, value: T) -> Result<(), StencilError> {
        self.buffer.fill_both(value)
    }

    /// Linear index of `p` under this storage's index function.
    #[inline]
    pub fn linear_index(&self, p: impl Into<GridPoint>) -> Result<usize, StencilError> {
        self.layout.index(p.into())
    }

    /// Inverse of [`linear_index`](Self::linear_index).
    pub fn grid_point_of(&self, index: usize) -> Result<GridPoint, StencilError> {
        self.layout.grid_point_of(index)
    }

    /// Host value at `p`.
    pub fn get(&self, p: impl Into<GridPoint>) -> Result<T, StencilError> {
        let idx = self.layout.index(p.into())?;
        Ok(self.buffer.host()?[idx])
    }

    /// Write `value` at `p` on the host; the device copy becomes stale.
    pub fn set(&mut self, p: impl Into<GridPoint>, value: T) -> Result<(), StencilError> {
        let idx = self.layout.index(p.into())?;
        self.buffer.host_mut()?[idx] = value;
        Ok(())
    }

    /// Whole host copy in index-function order.
    pub fn host_slice(&self) -> Result<&[T], StencilError> {
        self.buffer.host()
    }

    /// Whole host copy, writable; the device copy becomes stale.
    pub fn host_slice_mut(&mut self) -> Result<&mut [T], StencilError> {
        self.buffer.host_mut()
    }

    pub(crate) fn view(&self, side: Residency) -> Result<&[T], StencilError> {
        self.buffer.view(side)
    }

    pub(crate) fn view_mut(&mut self, side: Residency) -> Result<&mut [T], StencilError> {
        self.buffer.view_mut(side)
    }

    pub fn sync_to_device(&mut self) -> Result<(), StencilError> {
        self.buffer.sync_to_device()
    }

    pub fn sync_to_host(&mut self) -> Result<(), StencilError> {
        self.buffer.sync_to_host()
    }

    /// `Ok` if the accelerator copy was allocated.
    pub fn device_status(&self) -> Result<(), StencilError> {
        self.buffer.device_status()
    }

    /// Free host and device copies.
    pub fn release(&mut self) {
        self.buffer.release();
    }

    pub(crate) fn release_device(&mut self) {
        self.buffer.release_device();
    }
}

impl<T: Element> DebugInvariants for Storage<T> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Storage");
    }

    fn validate_invariants(&self) -> Result<(), StencilError> {
        self.layout.validate_invariants()?;
        if !self.buffer.is_released() && self.buffer.len() != self.layout.size() {
            return Err(StencilError::DimensionMismatch {
                name: self.name.clone(),
                expected: self.layout.dims(),
                found: [self.buffer.len(), 1, 1, 1],
            });
        }
        Ok(())
    }
}

/// Creates storages sized from a topology's mesh.
#[derive(Clone, Debug)]
pub struct StorageFactory {
    topology: Arc<dyn Topology>,
    device: Device,
}

impl StorageFactory {
    /// Factory allocating accelerator copies on the default device.
    pub fn new(topology: Arc<dyn Topology>) -> Self {
        Self {
            topology,
            device: Device::default_device(),
        }
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn topology(&self) -> &Arc<dyn Topology> {
        &self.topology
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Layout of a `location` storage on this mesh.
    pub fn layout(&self, location: LocationType) -> Result<StorageLayout, StencilError> {
        let colors = self
            .topology
            .n_colors(location)
            .ok_or(StencilError::UnsupportedLocation(location))?;
        let dims = self.topology.dims();
        Ok(StorageLayout::new(dims.d1, colors, dims.d2, dims.d3))
    }

    /// New zero-initialized storage named `name` on `location`.
    ///
    /// # Errors
    /// `UnsupportedLocation` if the mesh has no such location. Device
    /// allocation failures are not reported here; see
    /// [`Storage::device_status`].
    pub fn make_storage<T: Element>(
        &self,
        location: LocationType,
        name: &str,
    ) -> Result<Storage<T>, StencilError> {
        let layout = self.layout(location)?;
        log::debug!(
            "make_storage `{name}` on {location}: dims {:?} ({} elements)",
            layout.dims(),
            layout.size()
        );
        Ok(Storage::new(name, location, layout, &self.device))
    }
}
