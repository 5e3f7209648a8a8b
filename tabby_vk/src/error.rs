use std::path::PathBuf;

use ash::vk;
/// Possible errors
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TabbyError {
    #[error("Unable to load the Vulkan library: {0}")]
    Loading(String),

    #[error("Failed to create the Vulkan instance: {0}")]
    InstanceCreate(vk::Result),

    #[error("Instance extension {0} is not available")]
    ExtensionUnavailable(String),

    #[error("Validation layer {0} is not available")]
    ValidationLayerUnavailable(String),

    #[error("Failed to create the debug messenger: {0}")]
    DebugMessengerCreate(vk::Result),

    #[error("No suitable physical device has been found")]
    NoSuitableDevice,

    #[error("Failed to create the logical device: {0}")]
    DeviceCreate(vk::Result),

    #[error("Failed to create a window surface: {0}")]
    SurfaceCreate(vk::Result),

    #[error("Surface reports no formats or no present modes")]
    SwapchainUnsupported,

    #[error("Failed to create the swapchain: {0}")]
    SwapchainCreate(vk::Result),

    #[error("Swapchain is out of date and no recreation was requested")]
    SwapchainOutOfDate,

    #[error("Swapchain cannot go from {from} to {to}")]
    InvalidSwapchainState {
        from: &'static str,
        to: &'static str,
    },

    #[error("Failed to create an image view: {0}")]
    ImageViewCreate(vk::Result),

    #[error("Failed to create an image: {0}")]
    ImageCreate(vk::Result),

    #[error("Failed to create a sampler: {0}")]
    SamplerCreate(vk::Result),

    #[error("Failed to create a shader module: {0}")]
    ShaderModule(String),

    #[error("Failed to create a graphics pipeline: {0}")]
    PipelineCreate(vk::Result),

    #[error("Failed to create the render pass: {0}")]
    RenderPassCreate(vk::Result),

    #[error("Failed to create a framebuffer: {0}")]
    FramebufferCreate(vk::Result),

    #[error("Failed to create a command pool: {0}")]
    CommandPoolCreate(vk::Result),

    #[error("Failed to allocate or record command buffers: {0}")]
    CommandBuffers(vk::Result),

    #[error("Failed to create a semaphore: {0}")]
    SemaphoreCreate(vk::Result),

    #[error("Failed to submit or present a frame: {0}")]
    Draw(vk::Result),

    #[error("No memory type matches filter {type_filter:#b} with {flags:?}")]
    MemoryTypeNotFound {
        type_filter: u32,
        flags: vk::MemoryPropertyFlags,
    },

    #[error("Buffer of {capacity} bytes cannot hold {requested} bytes")]
    BufferTooSmall {
        capacity: vk::DeviceSize,
        requested: vk::DeviceSize,
    },

    #[error("Failed to create a buffer: {0}")]
    BufferCreate(vk::Result),

    #[error("Buffer memory is not host visible")]
    NotHostVisible,

    #[error("Failed to create a descriptor set layout: {0}")]
    DescriptorSetLayoutCreate(vk::Result),

    #[error("Failed to create the descriptor pool: {0}")]
    DescriptorPoolCreate(vk::Result),

    #[error("Failed to allocate a descriptor set: {0}")]
    DescriptorSetAllocate(vk::Result),

    #[error("Failed to load texture {path:?}: {reason}")]
    TextureLoad { path: PathBuf, reason: String },

    #[error("Failed to allocate texture memory")]
    TextureAlloc,

    #[error("Unsupported layout transition from {old:?} to {new:?}")]
    UnsupportedLayoutTransition {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },

    #[error("Failed to load model {path:?}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Unknown buffer type requested")]
    UnknownBufferType,

    #[error("Pipeline settings are missing the {0} shader")]
    MissingShader(&'static str),

    #[error(transparent)]
    Vk(#[from] vk::Result),
}

pub type Result<T> = std::result::Result<T, TabbyError>;

impl From<ash::LoadingError> for TabbyError {
    fn from(value: ash::LoadingError) -> Self {
        TabbyError::Loading(value.to_string())
    }
}
