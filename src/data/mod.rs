//! Data module: storages, their index function and dual-resident buffers

pub mod device;
pub mod hybrid;
pub mod layout;
pub mod storage;

pub use device::{Device, DeviceMemory};
pub use hybrid::{DeviceView, DeviceViewMut, HybridBuffer};
pub use layout::StorageLayout;
pub use storage::{Storage, StorageFactory};

/// Element types a storage can hold.
///
/// `Pod` lets host/device synchronization move buffers as raw bytes.
pub trait Element: bytemuck::Pod + Default + std::fmt::Debug + Send + Sync + 'static {}

impl<T> Element for T where T: bytemuck::Pod + Default + std::fmt::Debug + Send + Sync + 'static {}
