use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use tabby_vk::types::InstanceData;

use crate::layout::Placement;
use crate::material::MaterialId;
use crate::mesh::Mesh;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation_axis: Vec3,
    pub degrees: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation_axis: Vec3::Z,
            degrees: 0.0,
        }
    }
}

impl Transform {
    /// A zero axis means no rotation
    pub fn rotation(&self) -> Quat {
        let axis = self.rotation_axis.normalize_or_zero();
        if axis == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            Quat::from_axis_angle(axis, self.degrees.to_radians())
        }
    }

    /// Model matrix, `T * R * S`
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation(), self.position)
    }
}

/// An individually placed mesh
#[derive(Debug, Clone)]
pub struct Object {
    id: ObjectId,
    mesh: Arc<Mesh>,
    pub material: MaterialId,
    pub transform: Transform,
    scene_index: Option<u32>,
    vertex_offset: u32,
    first_index: u32,
    instance_count: u32,
}

impl Object {
    pub(crate) fn new(id: ObjectId, mesh: Arc<Mesh>) -> Self {
        Self {
            id,
            mesh,
            material: MaterialId::DEFAULT,
            transform: Transform::default(),
            scene_index: None,
            vertex_offset: 0,
            first_index: 0,
            instance_count: 0,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    /// Slot in the object uniform buffer, [`None`] until the next actualize
    pub fn scene_index(&self) -> Option<u32> {
        self.scene_index
    }

    /// First vertex of this object in the combined vertex buffer
    pub fn vertex_offset(&self) -> u32 {
        self.vertex_offset
    }

    /// First index of this object in the combined index buffer
    pub fn first_index(&self) -> u32 {
        self.first_index
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub(crate) fn add_instance(&mut self) {
        self.instance_count += 1;
    }

    pub(crate) fn remove_instance(&mut self) {
        self.instance_count = self.instance_count.saturating_sub(1);
    }

    pub(crate) fn place(&mut self, placement: &Placement) {
        self.scene_index = Some(placement.scene_index);
        self.vertex_offset = placement.vertex_offset;
        self.first_index = placement.first_index;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

/// Repeats its parent's mesh and material with its own [`InstanceData`]
#[derive(Debug, Clone, PartialEq)]
pub struct InstancedObject {
    id: InstanceId,
    parent: ObjectId,
    pub data: InstanceData,
}

impl InstancedObject {
    pub(crate) fn new(id: InstanceId, parent: ObjectId) -> Self {
        Self {
            id,
            parent,
            data: InstanceData::default(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn parent(&self) -> ObjectId {
        self.parent
    }
}
