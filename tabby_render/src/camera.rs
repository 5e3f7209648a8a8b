use glam::{Mat4, Vec3, Vec4};
use tabby_vk::ash::vk;
use tabby_vk::types::CameraUniform;

pub const DEFAULT_WORLD_AMBIENT: Vec4 = Vec4::new(0.1, 0.1, 0.1, 1.0);

/// Perspective camera with +Z up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Not required to be normalized
    pub direction: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        let position = Vec3::new(2.0, 2.0, 2.0);
        Self {
            position,
            direction: -position,
            up: Vec3::Z,
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.direction, self.up)
    }

    /// Projection with Y flipped for Vulkan clip space
    pub fn projection(&self, aspect: f32) -> Mat4 {
        let mut projection =
            Mat4::perspective_rh(self.fov_y_degrees.to_radians(), aspect, self.near, self.far);
        projection.y_axis.y *= -1.0;
        projection
    }

    pub fn uniform(&self, extent: vk::Extent2D, world_ambient: Vec4) -> CameraUniform {
        let aspect = if extent.height == 0 {
            1.0
        } else {
            extent.width as f32 / extent.height as f32
        };
        CameraUniform {
            view: self.view(),
            proj: self.projection(aspect),
            world_ambient,
        }
    }
}
