pub mod selection;
pub mod surface;
pub mod swapchain;

pub use surface::{Surface, SurfaceProvider};
pub use swapchain::{Acquired, Presented, SwapchainManager, SwapchainState};
