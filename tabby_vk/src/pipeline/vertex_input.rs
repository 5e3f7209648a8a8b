use std::mem::{offset_of, size_of};

use ash::vk;

use crate::types::{InstanceData, Vertex};

pub const VERTEX_BINDING: u32 = 0;
pub const INSTANCE_BINDING: u32 = 1;

pub fn binding_descriptions(instancing: bool) -> Vec<vk::VertexInputBindingDescription> {
    let mut bindings = vec![vk::VertexInputBindingDescription {
        binding: VERTEX_BINDING,
        stride: size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }];
    if instancing {
        bindings.push(vk::VertexInputBindingDescription {
            binding: INSTANCE_BINDING,
            stride: size_of::<InstanceData>() as u32,
            input_rate: vk::VertexInputRate::INSTANCE,
        });
    }
    bindings
}

/// Locations 0 to 3 come from [`Vertex`], 4 to 6 from [`InstanceData`]
pub fn attribute_descriptions(instancing: bool) -> Vec<vk::VertexInputAttributeDescription> {
    let attribute = |location, binding, format, offset: usize| vk::VertexInputAttributeDescription {
        location,
        binding,
        format,
        offset: offset as u32,
    };
    let mut attributes = vec![
        attribute(0, VERTEX_BINDING, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, pos)),
        attribute(1, VERTEX_BINDING, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, color)),
        attribute(2, VERTEX_BINDING, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, tex_coord)),
        attribute(3, VERTEX_BINDING, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
    ];
    if instancing {
        attributes.extend([
            attribute(4, INSTANCE_BINDING, vk::Format::R32G32B32_SFLOAT, offset_of!(InstanceData, pos)),
            attribute(5, INSTANCE_BINDING, vk::Format::R32G32B32_SFLOAT, offset_of!(InstanceData, rot)),
            attribute(6, INSTANCE_BINDING, vk::Format::R32G32B32_SFLOAT, offset_of!(InstanceData, scale)),
        ]);
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_attributes_are_packed() {
        let offsets: Vec<(u32, u32)> = attribute_descriptions(false)
            .iter()
            .map(|attribute| (attribute.location, attribute.offset))
            .collect();
        assert_eq!(offsets, vec![(0, 0), (1, 12), (2, 24), (3, 32)]);
        assert_eq!(binding_descriptions(false)[0].stride, 44);
    }

    #[test]
    fn instancing_adds_binding_one() {
        let bindings = binding_descriptions(true);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[1].input_rate, vk::VertexInputRate::INSTANCE);
        assert_eq!(bindings[1].stride, 36);
        let instance: Vec<(u32, u32)> = attribute_descriptions(true)
            .iter()
            .filter(|attribute| attribute.binding == INSTANCE_BINDING)
            .map(|attribute| (attribute.location, attribute.offset))
            .collect();
        assert_eq!(instance, vec![(4, 0), (5, 12), (6, 24)]);
    }
}
