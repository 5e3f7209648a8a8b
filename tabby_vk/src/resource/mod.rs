pub mod image;
pub mod image_view;
pub mod layout;
pub mod memory;
pub mod sampler;
pub mod texture;
pub mod transfer_buffer;

pub use image::ResourceImage;
pub use image_view::ImageView;
pub use layout::{layout_transition, LayoutTransition};
pub use memory::find_memory_type;
pub use sampler::Sampler;
pub use texture::Texture;
pub use transfer_buffer::TransferBuffer;
