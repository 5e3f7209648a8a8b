//! Turning files into meshes and pixels. The scene only sees the traits, so applications
//! can plug in their own formats.
pub mod model;
pub mod texture;

pub use model::{ModelLoader, ObjModelLoader};
pub use texture::{ImageTextureLoader, TextureImage, TextureLoader};
