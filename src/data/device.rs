//! Accelerator memory pool.
//!
//! A [`Device`] hands out accelerator-resident allocations and tracks how many
//! bytes are live against an optional capacity. Allocation beyond capacity is
//! an error instead of a diagnostic that execution silently ignores.
//!
//! The accelerator is emulated in-process: device memory is a separate heap
//! allocation that host code can only reach through explicit copies, and
//! kernels run their lanes on the rayon pool.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::data::Element;
use crate::stencil_error::StencilError;

/// Environment variable bounding the default device, in bytes.
pub const DEVICE_CAPACITY_ENV: &str = "MESH_STENCIL_DEVICE_CAPACITY";

static DEFAULT_DEVICE: Lazy<Device> = Lazy::new(|| {
    let capacity = std::env::var(DEVICE_CAPACITY_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok());
    match capacity {
        Some(bytes) => {
            log::info!("default device capped at {bytes} bytes via {DEVICE_CAPACITY_ENV}");
            Device::with_capacity("default", bytes)
        }
        None => Device::new("default"),
    }
});

struct DeviceInner {
    name: String,
    capacity: Option<usize>,
    allocated: Mutex<usize>,
}

/// Cloneable handle to one accelerator memory pool.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("allocated", &*self.inner.allocated.lock())
            .finish()
    }
}

impl Device {
    /// Unbounded device.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// Device that refuses allocations past `bytes` live bytes.
    pub fn with_capacity(name: impl Into<String>, bytes: usize) -> Self {
        Self::build(name.into(), Some(bytes))
    }

    fn build(name: String, capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                name,
                capacity,
                allocated: Mutex::new(0),
            }),
        }
    }

    /// Process-wide default device.
    pub fn default_device() -> Device {
        DEFAULT_DEVICE.clone()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    /// Live bytes.
    pub fn allocated_bytes(&self) -> usize {
        *self.inner.allocated.lock()
    }

    /// Bytes still available, `usize::MAX` when unbounded.
    pub fn available_bytes(&self) -> usize {
        match self.inner.capacity {
            Some(cap) => cap.saturating_sub(self.allocated_bytes()),
            None => usize::MAX,
        }
    }

    /// Whether two handles refer to the same pool.
    pub fn same_device(&self, other: &Device) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Allocate `len` elements filled with `fill`.
    ///
    /// # Errors
    /// `DeviceAllocation` when the request exceeds the remaining capacity.
    pub fn allocate<T: Element>(&self, len: usize, fill: T) -> Result<DeviceMemory<T>, StencilError> {
        let requested = len.saturating_mul(std::mem::size_of::<T>());
        {
            let mut allocated = self.inner.allocated.lock();
            if let Some(cap) = self.inner.capacity {
                let available = cap.saturating_sub(*allocated);
                if requested > available {
                    return Err(StencilError::DeviceAllocation {
                        requested,
                        available,
                    });
                }
            }
            *allocated += requested;
        }
        Ok(DeviceMemory {
            data: vec![fill; len],
            bytes: requested,
            device: self.clone(),
        })
    }

    fn free(&self, bytes: usize) {
        let mut allocated = self.inner.allocated.lock();
        *allocated = allocated.saturating_sub(bytes);
    }
}

/// One live device allocation. Returns its bytes to the pool on drop.
pub struct DeviceMemory<T: Element> {
    data: Vec<T>,
    bytes: usize,
    device: Device,
}

impl<T: Element> DeviceMemory<T> {
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Size of the allocation in bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl<T: Element> fmt::Debug for DeviceMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceMemory")
            .field("device", &self.device.name())
            .field("len", &self.data.len())
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl<T: Element> Drop for DeviceMemory<T> {
    fn drop(&mut self) {
        self.device.free(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_accounted_and_freed() {
        let dev = Device::with_capacity("test", 1024);
        let mem = dev.allocate::<f64>(16, 0.0).unwrap();
        assert_eq!(mem.bytes(), 128);
        assert_eq!(dev.allocated_bytes(), 128);
        assert_eq!(dev.available_bytes(), 896);
        drop(mem);
        assert_eq!(dev.allocated_bytes(), 0);
    }

    #[test]
    fn over_capacity_is_refused() {
        let dev = Device::with_capacity("small", 64);
        let _a = dev.allocate::<f64>(6, 1.0).unwrap();
        let err = dev.allocate::<f64>(4, 1.0).unwrap_err();
        assert_eq!(
            err,
            StencilError::DeviceAllocation {
                requested: 32,
                available: 16
            }
        );
        // the failed request did not consume anything
        assert_eq!(dev.allocated_bytes(), 48);
    }

    #[test]
    fn handles_share_the_pool() {
        let dev = Device::new("shared");
        let other = dev.clone();
        let _m = other.allocate::<u32>(10, 7).unwrap();
        assert!(dev.same_device(&other));
        assert_eq!(dev.allocated_bytes(), 40);
        assert_eq!(dev.available_bytes(), usize::MAX);
    }
}
