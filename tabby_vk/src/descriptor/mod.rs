pub mod allocator;
pub mod layouts;

pub use allocator::DescriptorAllocator;
pub use layouts::DescriptorLayouts;
