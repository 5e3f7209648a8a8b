//! Data laid out exactly as the shaders read it
use std::hash::{Hash, Hasher};

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// A single vertex as stored in the combined vertex buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct Vertex {
    pub pos: Vec3,
    pub color: Vec3,
    pub tex_coord: Vec2,
    pub normal: Vec3,
}

impl Vertex {
    fn bits(&self) -> [u32; 11] {
        bytemuck::cast(*self)
    }
}

// Compared by bit pattern so that equality agrees with the hash
impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Per instance data of the instancing pipeline, vertex binding 1
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub pos: Vec3,
    /// Euler angles in radians
    pub rot: Vec3,
    pub scale: Vec3,
}

impl Default for InstanceData {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            rot: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Camera uniform, set 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: Mat4,
    pub proj: Mat4,
    pub world_ambient: Vec4,
}

/// One entry of the light uniform array, set 3
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightData {
    /// w unused
    pub pos: Vec4,
    pub color: Vec4,
    pub specular: Vec4,
    /// constant, linear, quadratic, unused
    pub attenuation: Vec4,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            pos: Vec4::ZERO,
            color: Vec4::ONE,
            specular: Vec4::ONE,
            attenuation: Vec4::new(0.0, 1.0, 0.0, 0.0),
        }
    }
}

/// Per object slot of the dynamic uniform buffer, set 2
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: Mat4,
    /// specular strength, shininess, ambient strength, light reception
    pub material: Vec4,
}

/// Fragment stage push constants
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PushConstants {
    pub use_phong: vk::Bool32,
    pub light_count: u32,
}
