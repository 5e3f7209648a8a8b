//! Where every object lands in the combined GPU buffers.
//!
//! [`SceneLayout::plan`] is pure. It concatenates geometry in object order, groups
//! instances by parent in that same order and sizes the object uniform buffer.
use std::collections::HashMap;
use std::mem::size_of;

use tabby_vk::ash::vk;
use tabby_vk::types::{InstanceData, ObjectUniform, Vertex};
use tabby_vk::util::align;
use tracing::warn;

use crate::object::{InstancedObject, Object, ObjectId};

/// Distance between two object uniforms in the dynamic buffer
pub fn dynamic_stride(min_alignment: vk::DeviceSize) -> vk::DeviceSize {
    align(size_of::<ObjectUniform>() as vk::DeviceSize, min_alignment)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub object: ObjectId,
    pub scene_index: u32,
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub first_index: u32,
    pub index_count: u32,
}

/// A run of consecutive instances sharing one parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceBatch {
    pub parent: ObjectId,
    /// Scene index of the parent
    pub parent_index: u32,
    pub first_instance: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneLayout {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub instances: Vec<InstanceData>,
    pub placements: Vec<Placement>,
    pub batches: Vec<InstanceBatch>,
    pub dynamic_stride: vk::DeviceSize,
    /// `dynamic_stride * max(object count, 1)`
    pub dynamic_size: vk::DeviceSize,
}

impl SceneLayout {
    pub fn plan(
        objects: &[Object],
        instances: &[InstancedObject],
        min_alignment: vk::DeviceSize,
    ) -> Self {
        let mut layout = SceneLayout {
            dynamic_stride: dynamic_stride(min_alignment),
            ..Default::default()
        };

        for (scene_index, object) in objects.iter().enumerate() {
            let mesh = object.mesh();
            layout.placements.push(Placement {
                object: object.id(),
                scene_index: scene_index as u32,
                vertex_offset: layout.vertices.len() as u32,
                vertex_count: mesh.vertex_count(),
                first_index: layout.indices.len() as u32,
                index_count: mesh.index_count(),
            });
            layout.vertices.extend_from_slice(&mesh.vertices);
            layout.indices.extend_from_slice(&mesh.indices);
        }

        let mut by_parent: HashMap<ObjectId, Vec<InstanceData>> = HashMap::new();
        for instance in instances {
            by_parent
                .entry(instance.parent())
                .or_default()
                .push(instance.data);
        }
        for placement in &layout.placements {
            let Some(data) = by_parent.remove(&placement.object) else {
                continue;
            };
            layout.batches.push(InstanceBatch {
                parent: placement.object,
                parent_index: placement.scene_index,
                first_instance: layout.instances.len() as u32,
                count: data.len() as u32,
            });
            layout.instances.extend(data);
        }
        for (parent, orphans) in by_parent {
            warn!(
                "Skipping {} instances of missing object {:?}",
                orphans.len(),
                parent
            );
        }

        layout.dynamic_size = layout.dynamic_stride * objects.len().max(1) as vk::DeviceSize;
        layout
    }

    pub fn placement(&self, object: ObjectId) -> Option<&Placement> {
        self.placements.iter().find(|p| p.object == object)
    }
}
