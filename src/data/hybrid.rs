//! Dual-resident buffer: one host copy and one device copy of the same data.
//!
//! Synchronization is explicit and one-directional: [`HybridBuffer::sync_to_device`]
//! and [`HybridBuffer::sync_to_host`] copy the whole buffer. Each copy carries a
//! valid flag; writing one side marks the other stale, and any access to a
//! stale side fails with [`StencilError::StaleBuffer`] instead of returning old
//! data.
//!
//! A device allocation failure at construction is logged and remembered. The
//! buffer stays usable on the host; the failure surfaces when a computation
//! that needs the device copy is made ready.

use std::ops::{Deref, DerefMut};

use crate::data::Element;
use crate::data::device::{Device, DeviceMemory};
use crate::stencil_error::{Residency, StencilError};

#[derive(Debug)]
enum DeviceSlot<T: Element> {
    Allocated(DeviceMemory<T>),
    Failed(StencilError),
    Released,
}

/// Host + device copies of a buffer of `T`.
#[derive(Debug)]
pub struct HybridBuffer<T: Element> {
    label: String,
    host: Vec<T>,
    device: DeviceSlot<T>,
    len: usize,
    host_valid: bool,
    device_valid: bool,
}

/// Read-only capture of the device copy for kernel dispatch.
#[derive(Clone, Copy, Debug)]
pub struct DeviceView<'a, T> {
    data: &'a [T],
}

/// Writable capture of the device copy for kernel dispatch.
#[derive(Debug)]
pub struct DeviceViewMut<'a, T> {
    data: &'a mut [T],
}

impl<T> Deref for DeviceView<'_, T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        self.data
    }
}

impl<T> Deref for DeviceViewMut<'_, T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        self.data
    }
}

impl<T> DerefMut for DeviceViewMut<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.data
    }
}

impl<'a, T> DeviceViewMut<'a, T> {
    /// Give up the view, keeping the borrow of the device slice.
    pub fn into_slice(self) -> &'a mut [T] {
        self.data
    }
}

impl<T: Element> HybridBuffer<T> {
    /// Allocate `len` elements on the host and on `device`, both set to `fill`.
    pub fn new(label: impl Into<String>, len: usize, fill: T, device: &Device) -> Self {
        let label = label.into();
        let (slot, device_valid) = match device.allocate(len, fill) {
            Ok(mem) => (DeviceSlot::Allocated(mem), true),
            Err(e) => {
                log::warn!("device allocation for `{label}` on `{}` failed: {e}", device.name());
                (DeviceSlot::Failed(e), false)
            }
        };
        Self {
            label,
            host: vec![fill; len],
            device: slot,
            len,
            host_valid: true,
            device_valid,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_host_valid(&self) -> bool {
        self.host_valid
    }

    pub fn is_device_valid(&self) -> bool {
        self.device_valid
    }

    pub fn is_released(&self) -> bool {
        matches!(self.device, DeviceSlot::Released)
    }

    /// `Ok` if a device copy exists, otherwise the allocation error.
    pub fn device_status(&self) -> Result<(), StencilError> {
        match &self.device {
            DeviceSlot::Allocated(_) => Ok(()),
            DeviceSlot::Failed(e) => Err(e.clone()),
            DeviceSlot::Released => Err(self.released()),
        }
    }

    fn released(&self) -> StencilError {
        StencilError::BufferReleased(self.label.clone())
    }

    fn stale(&self, side: Residency) -> StencilError {
        StencilError::StaleBuffer {
            name: self.label.clone(),
            side,
        }
    }

    fn check_host(&self) -> Result<(), StencilError> {
        if self.is_released() {
            Err(self.released())
        } else if !self.host_valid {
            Err(self.stale(Residency::Host))
        } else {
            Ok(())
        }
    }

    /// Host copy, for reading.
    pub fn host(&self) -> Result<&[T], StencilError> {
        self.check_host()?;
        Ok(&self.host)
    }

    /// Host copy, for writing. Marks the device copy stale.
    pub fn host_mut(&mut self) -> Result<&mut [T], StencilError> {
        self.check_host()?;
        self.device_valid = false;
        Ok(&mut self.host)
    }

    fn device_memory(&self) -> Result<&DeviceMemory<T>, StencilError> {
        match &self.device {
            DeviceSlot::Allocated(mem) => Ok(mem),
            DeviceSlot::Failed(e) => Err(e.clone()),
            DeviceSlot::Released => Err(self.released()),
        }
    }

    /// Capture the device copy for reading.
    pub fn device(&self) -> Result<DeviceView<'_, T>, StencilError> {
        let mem = self.device_memory()?;
        if !self.device_valid {
            return Err(self.stale(Residency::Device));
        }
        Ok(DeviceView {
            data: mem.as_slice(),
        })
    }

    /// Capture the device copy for writing. Marks the host copy stale.
    pub fn device_mut(&mut self) -> Result<DeviceViewMut<'_, T>, StencilError> {
        self.device_memory()?;
        if !self.device_valid {
            return Err(self.stale(Residency::Device));
        }
        self.host_valid = false;
        match &mut self.device {
            DeviceSlot::Allocated(mem) => Ok(DeviceViewMut {
                data: mem.as_mut_slice(),
            }),
            // checked by device_memory above
            _ => Err(StencilError::BufferReleased(self.label.clone())),
        }
    }

    /// Read copy on `side`.
    pub fn view(&self, side: Residency) -> Result<&[T], StencilError> {
        match side {
            Residency::Host => self.host(),
            Residency::Device => self.device().map(|v| v.data),
        }
    }

    /// Write copy on `side`; the other side becomes stale.
    pub fn view_mut(&mut self, side: Residency) -> Result<&mut [T], StencilError> {
        match side {
            Residency::Host => self.host_mut(),
            Residency::Device => self.device_mut().map(DeviceViewMut::into_slice),
        }
    }

    /// Set every host element to `value`. Marks the device copy stale.
    pub fn fill_host(&mut self, value: T) -> Result<(), StencilError> {
        if self.is_released() {
            return Err(self.released());
        }
        self.host.fill(value);
        self.host_valid = true;
        self.device_valid = false;
        Ok(())
    }

    /// Set every element of both copies to `value`; both become valid.
    pub fn fill_both(&mut self, value: T) -> Result<(), StencilError> {
        if self.is_released() {
            return Err(self.released());
        }
        self.host.fill(value);
        self.host_valid = true;
        match &mut self.device {
            DeviceSlot::Allocated(mem) => {
                mem.as_mut_slice().fill(value);
                self.device_valid = true;
                Ok(())
            }
            DeviceSlot::Failed(e) => Err(e.clone()),
            DeviceSlot::Released => Err(StencilError::BufferReleased(self.label.clone())),
        }
    }

    /// Copy the host copy over the device copy.
    ///
    /// # Errors
    /// `StaleBuffer` if the host copy is stale, the allocation error if no
    /// device copy exists, `BufferReleased` after [`release`](Self::release).
    pub fn sync_to_device(&mut self) -> Result<(), StencilError> {
        self.check_host()?;
        self.device_memory()?;
        if let DeviceSlot::Allocated(mem) = &mut self.device {
            let dst: &mut [u8] = bytemuck::cast_slice_mut(mem.as_mut_slice());
            dst.copy_from_slice(bytemuck::cast_slice(&self.host));
            self.device_valid = true;
        }
        Ok(())
    }

    /// Copy the device copy over the host copy.
    pub fn sync_to_host(&mut self) -> Result<(), StencilError> {
        self.device_memory()?;
        if !self.device_valid {
            return Err(self.stale(Residency::Device));
        }
        if let DeviceSlot::Allocated(mem) = &self.device {
            let src: &[u8] = bytemuck::cast_slice(mem.as_slice());
            let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut self.host);
            dst.copy_from_slice(src);
            self.host_valid = true;
        }
        Ok(())
    }

    /// Free both copies. Every later access fails with `BufferReleased`.
    pub fn release(&mut self) {
        if self.is_released() {
            return;
        }
        log::debug!("releasing buffer `{}` ({} elements)", self.label, self.len);
        self.host = Vec::new();
        self.device = DeviceSlot::Released;
        self.host_valid = false;
        self.device_valid = false;
    }

    /// Free only the device copy; the host copy stays readable.
    pub fn release_device(&mut self) {
        if let DeviceSlot::Allocated(_) = self.device {
            self.device = DeviceSlot::Failed(StencilError::BufferReleased(self.label.clone()));
            self.device_valid = false;
        }
    }
}
