//! Scene level rendering on top of `tabby_vk`.
//!
//! A [`Scene`] collects objects, instances, materials and lights. Calling
//! [`Scene::actualize`] packs them into combined GPU buffers and records the static
//! draws; [`Scene::update`] refreshes the per frame uniforms.

pub mod backend;
pub mod camera;
mod engine;
pub mod frame;
mod fps;
pub mod layout;
pub mod light;
pub mod loader;
pub mod material;
pub mod mesh;
pub mod object;
pub mod resources;
mod scene;

#[cfg(test)]
mod fake;

pub use backend::{GpuBuffer, GpuTexture, RenderBackend};
pub use camera::Camera;
pub use engine::Engine;
pub use fps::FpsCounter;
pub use light::{Light, LightId};
pub use material::{Material, MaterialId, MaterialKind, MaterialProperties};
pub use mesh::Mesh;
pub use object::{InstanceId, InstancedObject, Object, ObjectId, Transform};
pub use scene::Scene;
pub use tabby_vk;
