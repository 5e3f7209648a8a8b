//! Frame rendering: the static draw list recorded at actualize time and the uniform
//! writes issued every frame.
use glam::Vec4;
use tabby_vk::Result;
use tabby_vk::ash::vk;
use tabby_vk::command::{DrawCommand, DrawList, PipelineKind};
use tabby_vk::types::{ObjectUniform, PushConstants};

use crate::backend::RenderBackend;
use crate::camera::Camera;
use crate::layout::SceneLayout;
use crate::light::Light;
use crate::material::Material;
use crate::object::Object;
use crate::resources::{GeometryHandles, SceneResourceManager, SceneSets};

/// Sets and push constants for the draw of `object`. False when there is no material.
fn bind_object<T>(
    list: &mut DrawList,
    object: &Object,
    scene_index: u32,
    materials: &[Material<T>],
    sets: SceneSets,
    stride: u32,
    light_count: u32,
) -> bool {
    let Some(material) = materials
        .get(object.material.index())
        .or_else(|| materials.first())
    else {
        return false;
    };
    list.push(DrawCommand::BindDescriptorSets {
        sets: vec![
            sets.camera,
            material.descriptor_set(),
            sets.object,
            sets.lights,
        ],
        dynamic_offsets: vec![scene_index * stride],
    });
    list.push(DrawCommand::PushConstants(PushConstants {
        use_phong: material.properties.use_phong(),
        light_count,
    }));
    true
}

/// Draws every object once through the main pipeline, then every instance batch
/// through the instancing pipeline. `objects` must be in the order `layout` was planned.
pub fn build_draw_list<T>(
    layout: &SceneLayout,
    buffers: GeometryHandles,
    sets: SceneSets,
    objects: &[Object],
    materials: &[Material<T>],
    light_count: u32,
) -> DrawList {
    let stride = layout.dynamic_stride as u32;
    let mut list = DrawList::new();
    if layout.placements.is_empty() {
        return list;
    }

    list.push(DrawCommand::BindPipeline(PipelineKind::Main));
    list.push(DrawCommand::BindVertexBuffers {
        first_binding: 0,
        buffers: vec![buffers.vertex],
    });
    list.push(DrawCommand::BindIndexBuffer(buffers.index));
    for placement in &layout.placements {
        if placement.index_count == 0 {
            continue;
        }
        let Some(object) = objects.get(placement.scene_index as usize) else {
            continue;
        };
        if !bind_object(
            &mut list,
            object,
            placement.scene_index,
            materials,
            sets,
            stride,
            light_count,
        ) {
            continue;
        }
        list.push(DrawCommand::DrawIndexed {
            index_count: placement.index_count,
            instance_count: 1,
            first_index: placement.first_index,
            vertex_offset: placement.vertex_offset as i32,
            first_instance: 0,
        });
    }

    if layout.batches.is_empty() {
        return list;
    }
    list.push(DrawCommand::BindPipeline(PipelineKind::Instancing));
    list.push(DrawCommand::BindVertexBuffers {
        first_binding: 0,
        buffers: vec![buffers.vertex, buffers.instance],
    });
    list.push(DrawCommand::BindIndexBuffer(buffers.index));
    for batch in &layout.batches {
        let Some(placement) = layout.placements.get(batch.parent_index as usize) else {
            continue;
        };
        let Some(parent) = objects.get(batch.parent_index as usize) else {
            continue;
        };
        if placement.index_count == 0
            || !bind_object(
                &mut list,
                parent,
                batch.parent_index,
                materials,
                sets,
                stride,
                light_count,
            )
        {
            continue;
        }
        list.push(DrawCommand::DrawIndexed {
            index_count: placement.index_count,
            instance_count: batch.count,
            first_index: placement.first_index,
            vertex_offset: placement.vertex_offset as i32,
            first_instance: batch.first_instance,
        });
    }
    list
}

/// Per frame view of the scene passed to [`write_uniforms`]
pub struct FrameInputs<'a, T> {
    pub camera: &'a Camera,
    pub world_ambient: Vec4,
    pub extent: vk::Extent2D,
    pub lights: &'a [Light],
    pub objects: &'a [Object],
    pub materials: &'a [Material<T>],
}

/// Writes the camera, the light array and one uniform per placed object
pub fn write_uniforms<B: RenderBackend>(
    resources: &mut SceneResourceManager<B>,
    inputs: FrameInputs<'_, B::Texture>,
) -> Result<()> {
    resources.write_camera(&inputs.camera.uniform(inputs.extent, inputs.world_ambient))?;
    let lights: Vec<_> = inputs.lights.iter().map(Light::to_data).collect();
    resources.write_lights(&lights)?;

    let slots = resources.layout().placements.len() as u32;
    for object in inputs.objects {
        // objects added since the last actualize have no slot yet
        let Some(scene_index) = object.scene_index().filter(|index| *index < slots) else {
            continue;
        };
        let material = inputs
            .materials
            .get(object.material.index())
            .or_else(|| inputs.materials.first())
            .map(|material| material.properties.packed())
            .unwrap_or(Vec4::ZERO);
        resources.write_object(
            scene_index,
            &ObjectUniform {
                model: object.transform.matrix(),
                material,
            },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tabby_vk::ash::vk::Handle;
    use tabby_vk::types::Vertex;

    use super::*;
    use crate::material::{MaterialId, MaterialKind};
    use crate::mesh::Mesh;
    use crate::object::{InstanceId, InstancedObject, ObjectId};

    fn object(id: u64, vertices: usize) -> Object {
        let mesh = Mesh::new(
            format!("mesh{id}"),
            vec![Vertex::default(); vertices],
            (0..vertices as u32).collect(),
        );
        Object::new(ObjectId(id), Arc::new(mesh))
    }

    fn handles() -> GeometryHandles {
        GeometryHandles {
            vertex: vk::Buffer::from_raw(1),
            index: vk::Buffer::from_raw(2),
            instance: vk::Buffer::from_raw(3),
        }
    }

    fn sets() -> SceneSets {
        SceneSets {
            camera: vk::DescriptorSet::from_raw(10),
            object: vk::DescriptorSet::from_raw(11),
            lights: vk::DescriptorSet::from_raw(12),
        }
    }

    fn materials() -> Vec<Material<()>> {
        let mut materials = vec![Material::new(()), Material::new(())];
        materials[0].set_descriptor_set(vk::DescriptorSet::from_raw(20));
        materials[1].set_descriptor_set(vk::DescriptorSet::from_raw(21));
        materials[1].properties.kind = MaterialKind::Simple;
        materials
    }

    fn bind(material: u64, offset: u32) -> DrawCommand {
        DrawCommand::BindDescriptorSets {
            sets: vec![
                vk::DescriptorSet::from_raw(10),
                vk::DescriptorSet::from_raw(material),
                vk::DescriptorSet::from_raw(11),
                vk::DescriptorSet::from_raw(12),
            ],
            dynamic_offsets: vec![offset],
        }
    }

    #[test]
    fn nothing_to_draw() {
        let layout = SceneLayout::plan(&[], &[], 256);
        let list = build_draw_list(&layout, handles(), sets(), &[], &materials(), 0);
        assert!(list.is_empty());
    }

    #[test]
    fn one_draw_per_object_with_indices() {
        let mut objects = vec![object(0, 3), object(1, 0), object(2, 6)];
        objects[2].material = MaterialId(1);
        let layout = SceneLayout::plan(&objects, &[], 256);
        let list = build_draw_list(&layout, handles(), sets(), &objects, &materials(), 2);

        let expected = vec![
            DrawCommand::BindPipeline(PipelineKind::Main),
            DrawCommand::BindVertexBuffers {
                first_binding: 0,
                buffers: vec![vk::Buffer::from_raw(1)],
            },
            DrawCommand::BindIndexBuffer(vk::Buffer::from_raw(2)),
            bind(20, 0),
            DrawCommand::PushConstants(PushConstants {
                use_phong: vk::TRUE,
                light_count: 2,
            }),
            DrawCommand::DrawIndexed {
                index_count: 3,
                instance_count: 1,
                first_index: 0,
                vertex_offset: 0,
                first_instance: 0,
            },
            bind(21, 512),
            DrawCommand::PushConstants(PushConstants {
                use_phong: vk::FALSE,
                light_count: 2,
            }),
            DrawCommand::DrawIndexed {
                index_count: 6,
                instance_count: 1,
                first_index: 3,
                vertex_offset: 3,
                first_instance: 0,
            },
        ];
        assert_eq!(list.commands(), expected.as_slice());
    }

    #[test]
    fn instance_batches_use_parent_sets() {
        let mut objects = vec![object(0, 3), object(1, 4)];
        // material ids past the end fall back to the default material
        objects[1].material = MaterialId(7);
        let instances: Vec<_> = (0..3)
            .map(|i| InstancedObject::new(InstanceId(i), ObjectId(1)))
            .collect();
        let layout = SceneLayout::plan(&objects, &instances, 256);
        let list = build_draw_list(&layout, handles(), sets(), &objects, &materials(), 0);

        let commands = list.commands();
        let start = commands
            .iter()
            .position(|c| *c == DrawCommand::BindPipeline(PipelineKind::Instancing))
            .unwrap();
        assert_eq!(
            &commands[start + 1..],
            &[
                DrawCommand::BindVertexBuffers {
                    first_binding: 0,
                    buffers: vec![vk::Buffer::from_raw(1), vk::Buffer::from_raw(3)],
                },
                DrawCommand::BindIndexBuffer(vk::Buffer::from_raw(2)),
                bind(20, 256),
                DrawCommand::PushConstants(PushConstants {
                    use_phong: vk::TRUE,
                    light_count: 0,
                }),
                DrawCommand::DrawIndexed {
                    index_count: 4,
                    instance_count: 3,
                    first_index: 3,
                    vertex_offset: 3,
                    first_instance: 0,
                },
            ]
        );
        let main_draws = list
            .draws()
            .filter(|(kind, _)| *kind == Some(PipelineKind::Main))
            .count();
        assert_eq!(main_draws, 2);
    }
}
