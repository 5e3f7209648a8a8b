pub mod context;
pub mod physical_device;

pub use context::DeviceContext;
pub use physical_device::{PhysicalDevice, QueueFamilyIndices};
