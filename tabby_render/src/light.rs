use glam::{Vec3, Vec4};
use tabby_vk::types::LightData;

/// Size of the light uniform array
pub const MAX_LIGHTS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub(crate) u32);

/// Point light with distance attenuation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            constant: 0.0,
            linear: 1.0,
            quadratic: 0.0,
        }
    }
}

impl Light {
    pub fn to_data(&self) -> LightData {
        LightData {
            pos: self.position.extend(1.0),
            color: self.color.extend(1.0),
            specular: Vec4::ONE,
            attenuation: Vec4::new(self.constant, self.linear, self.quadratic, 0.0),
        }
    }
}
