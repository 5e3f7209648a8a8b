use derivative::Derivative;
use glam::Vec4;
use tabby_vk::ash::vk;
use tabby_vk::traits::Destructible;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub(crate) u32);

impl MaterialId {
    /// The white 1x1 material every scene starts with
    pub const DEFAULT: MaterialId = MaterialId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// Texture color only
    Simple,
    #[default]
    Phong,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialProperties {
    pub kind: MaterialKind,
    pub shininess: f32,
    pub specular_strength: f32,
    pub ambient_strength: f32,
    pub light_reception: f32,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            kind: MaterialKind::Phong,
            shininess: 16.0,
            specular_strength: 1.0,
            ambient_strength: 0.0,
            light_reception: 1.0,
        }
    }
}

impl MaterialProperties {
    /// Packed the way the object uniform stores it
    pub fn packed(&self) -> Vec4 {
        Vec4::new(
            self.specular_strength,
            self.shininess,
            self.ambient_strength,
            self.light_reception,
        )
    }

    pub fn use_phong(&self) -> vk::Bool32 {
        match self.kind {
            MaterialKind::Phong => vk::TRUE,
            MaterialKind::Simple => vk::FALSE,
        }
    }
}

/// A texture with its shading properties. The material owns the texture.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Material<T> {
    texture: T,
    pub properties: MaterialProperties,
    /// Null until the scene is actualized
    descriptor_set: vk::DescriptorSet,
}

impl<T> Material<T> {
    pub fn new(texture: T) -> Self {
        Self {
            texture,
            properties: MaterialProperties::default(),
            descriptor_set: vk::DescriptorSet::null(),
        }
    }

    pub fn texture(&self) -> &T {
        &self.texture
    }

    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    pub(crate) fn set_descriptor_set(&mut self, set: vk::DescriptorSet) {
        self.descriptor_set = set;
    }
}

impl<T: Destructible> Destructible for Material<T> {
    fn destroy(&mut self) {
        self.texture.destroy();
        self.descriptor_set = vk::DescriptorSet::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_properties() {
        let properties = MaterialProperties::default();
        assert_eq!(properties.kind, MaterialKind::Phong);
        assert_eq!(properties.packed(), Vec4::new(1.0, 16.0, 0.0, 1.0));
        assert_eq!(properties.use_phong(), vk::TRUE);
    }

    #[test]
    fn simple_materials_skip_phong() {
        let properties = MaterialProperties {
            kind: MaterialKind::Simple,
            ..Default::default()
        };
        assert_eq!(properties.use_phong(), vk::FALSE);
    }
}
