//! GPU state of a scene: geometry buffers, uniform buffers and their descriptor sets.
//!
//! [`SceneResourceManager::actualize`] commits in stages. Every new buffer is built
//! first and the old ones stay live until the device is idle, so a failed upload leaves
//! the previous frame intact.
use std::mem::size_of;

use derivative::Derivative;
use tabby_vk::ash::vk;
use tabby_vk::traits::Destructible;
use tabby_vk::types::{CameraUniform, LightData, ObjectUniform};
use tabby_vk::util::align;
use tabby_vk::{Result, TabbyError};
use tracing::{debug, error};

use crate::backend::{GeometryKind, GpuBuffer, RenderBackend, UniformBinding};
use crate::frame;
use crate::layout::SceneLayout;
use crate::light::MAX_LIGHTS;
use crate::material::Material;
use crate::object::{InstancedObject, Object};

/// A geometry buffer, or the placeholder standing in while the list is empty
#[derive(Debug)]
enum BufferSlot<T> {
    Dummy,
    Owned(T),
}

impl<T: GpuBuffer> BufferSlot<T> {
    fn handle(&self, dummy: &T) -> vk::Buffer {
        match self {
            BufferSlot::Dummy => dummy.handle(),
            BufferSlot::Owned(buffer) => buffer.handle(),
        }
    }

    fn destroy(&mut self) {
        if let BufferSlot::Owned(buffer) = self {
            buffer.destroy();
        }
        *self = BufferSlot::Dummy;
    }
}

#[derive(Debug)]
struct Placeholders<T> {
    vertex: T,
    index: T,
    instance: T,
}

#[derive(Debug)]
struct Geometry<T> {
    vertex: BufferSlot<T>,
    index: BufferSlot<T>,
    instance: BufferSlot<T>,
}

impl<T> Default for Geometry<T> {
    fn default() -> Self {
        Self {
            vertex: BufferSlot::Dummy,
            index: BufferSlot::Dummy,
            instance: BufferSlot::Dummy,
        }
    }
}

impl<T: GpuBuffer> Geometry<T> {
    fn destroy(&mut self) {
        self.vertex.destroy();
        self.index.destroy();
        self.instance.destroy();
    }
}

/// Descriptor sets shared by every draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneSets {
    pub camera: vk::DescriptorSet,
    pub object: vk::DescriptorSet,
    pub lights: vk::DescriptorSet,
}

impl Default for SceneSets {
    fn default() -> Self {
        Self {
            camera: vk::DescriptorSet::null(),
            object: vk::DescriptorSet::null(),
            lights: vk::DescriptorSet::null(),
        }
    }
}

/// Buffers bound by the static draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryHandles {
    pub vertex: vk::Buffer,
    pub index: vk::Buffer,
    pub instance: vk::Buffer,
}

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct SceneResourceManager<B: RenderBackend> {
    placeholders: Placeholders<B::Buffer>,
    geometry: Geometry<B::Buffer>,
    objects: B::Buffer,
    camera: B::Buffer,
    lights: B::Buffer,
    sets: SceneSets,
    layout: SceneLayout,
    stale: bool,
}

impl<B: RenderBackend> SceneResourceManager<B> {
    pub fn new(backend: &mut B) -> Result<Self> {
        let alignment = backend.min_uniform_alignment();
        let mut created: Vec<B::Buffer> = Vec::with_capacity(6);
        let result = (|| -> Result<SceneLayout> {
            for kind in [GeometryKind::Vertex, GeometryKind::Index, GeometryKind::Instance] {
                created.push(backend.create_placeholder_buffer(kind.usage())?);
            }
            let layout = SceneLayout::plan(&[], &[], alignment);
            created.push(backend.create_uniform_buffer(layout.dynamic_size)?);
            created.push(backend.create_uniform_buffer(align(
                size_of::<CameraUniform>() as vk::DeviceSize,
                alignment,
            ))?);
            created.push(backend.create_uniform_buffer(align(
                (size_of::<LightData>() * MAX_LIGHTS) as vk::DeviceSize,
                alignment,
            ))?);
            Ok(layout)
        })();
        let layout = match result {
            Ok(layout) => layout,
            Err(err) => {
                for mut buffer in created {
                    buffer.destroy();
                }
                return Err(err);
            }
        };
        let [vertex, index, instance, objects, camera, lights]: [B::Buffer; 6] = created
            .try_into()
            .map_err(|_| TabbyError::BufferCreate(vk::Result::ERROR_UNKNOWN))?;
        Ok(Self {
            placeholders: Placeholders {
                vertex,
                index,
                instance,
            },
            geometry: Geometry::default(),
            objects,
            camera,
            lights,
            sets: SceneSets::default(),
            layout,
            stale: false,
        })
    }

    /// Rebuilds every GPU buffer from `objects` and `instances`, reallocates descriptor
    /// sets and hands a fresh draw list to the backend.
    ///
    /// A failure before the swap destroys whatever was staged and leaves the previous
    /// state untouched. A failure after it marks the manager stale and clears the draws.
    pub fn actualize(
        &mut self,
        backend: &mut B,
        objects: &mut [Object],
        instances: &[InstancedObject],
        materials: &mut [Material<B::Texture>],
        light_count: u32,
    ) -> Result<()> {
        let layout = SceneLayout::plan(objects, instances, backend.min_uniform_alignment());
        debug!(
            "Actualizing {} objects, {} vertices, {} indices, {} instances",
            layout.placements.len(),
            layout.vertices.len(),
            layout.indices.len(),
            layout.instances.len()
        );

        let mut staged = Geometry::default();
        let mut staged_objects = None;
        if let Err(err) = Self::stage(backend, &layout, &mut staged, &mut staged_objects) {
            staged.destroy();
            if let Some(mut buffer) = staged_objects {
                buffer.destroy();
            }
            return Err(err);
        }
        if let Err(err) = backend.wait_idle() {
            staged.destroy();
            if let Some(mut buffer) = staged_objects {
                buffer.destroy();
            }
            return Err(err);
        }

        let mut old = std::mem::replace(&mut self.geometry, staged);
        old.destroy();
        if let Some(buffer) = staged_objects {
            let mut old_objects = std::mem::replace(&mut self.objects, buffer);
            old_objects.destroy();
        }
        // placements are planned in object order
        for (object, placement) in objects.iter_mut().zip(&layout.placements) {
            object.place(placement);
        }
        self.layout = layout;

        match self.rebuild(backend, objects, materials, light_count) {
            Ok(()) => {
                self.stale = false;
                Ok(())
            }
            Err(err) => {
                self.stale = true;
                if let Err(clear_err) = backend.clear_draws() {
                    error!("Clearing draws after a failed actualize failed: {clear_err}");
                }
                Err(err)
            }
        }
    }

    fn stage(
        backend: &mut B,
        layout: &SceneLayout,
        staged: &mut Geometry<B::Buffer>,
        staged_objects: &mut Option<B::Buffer>,
    ) -> Result<()> {
        staged.vertex = Self::stage_geometry(
            backend,
            GeometryKind::Vertex,
            bytemuck::cast_slice(&layout.vertices),
        )?;
        staged.index = Self::stage_geometry(
            backend,
            GeometryKind::Index,
            bytemuck::cast_slice(&layout.indices),
        )?;
        staged.instance = Self::stage_geometry(
            backend,
            GeometryKind::Instance,
            bytemuck::cast_slice(&layout.instances),
        )?;
        *staged_objects = Some(backend.create_uniform_buffer(layout.dynamic_size)?);
        Ok(())
    }

    fn stage_geometry(
        backend: &mut B,
        kind: GeometryKind,
        bytes: &[u8],
    ) -> Result<BufferSlot<B::Buffer>> {
        if bytes.is_empty() {
            return Ok(BufferSlot::Dummy);
        }
        backend
            .create_geometry_buffer(kind.usage(), bytes)
            .map(BufferSlot::Owned)
    }

    fn rebuild(
        &mut self,
        backend: &mut B,
        objects: &[Object],
        materials: &mut [Material<B::Texture>],
        light_count: u32,
    ) -> Result<()> {
        backend.rebuild_descriptor_pool(materials.len() as u32)?;
        for material in materials.iter_mut() {
            let set = backend.allocate_material_set(material.texture())?;
            material.set_descriptor_set(set);
        }
        self.sets = SceneSets {
            camera: backend.allocate_uniform_set(
                UniformBinding::Camera,
                &self.camera,
                self.camera.size(),
            )?,
            object: backend.allocate_uniform_set(
                UniformBinding::Object,
                &self.objects,
                self.layout.dynamic_stride,
            )?,
            lights: backend.allocate_uniform_set(
                UniformBinding::Lights,
                &self.lights,
                self.lights.size(),
            )?,
        };
        let draw_list = frame::build_draw_list(
            &self.layout,
            self.geometry_handles(),
            self.sets,
            objects,
            materials,
            light_count,
        );
        backend.rebuild_graphics(!self.layout.batches.is_empty(), draw_list)
    }

    pub fn write_camera(&mut self, uniform: &CameraUniform) -> Result<()> {
        self.camera.write(0, bytemuck::bytes_of(uniform))
    }

    /// Writes at most [`MAX_LIGHTS`] lights from the start of the array
    pub fn write_lights(&mut self, lights: &[LightData]) -> Result<()> {
        let lights = &lights[..lights.len().min(MAX_LIGHTS)];
        self.lights.write(0, bytemuck::cast_slice(lights))
    }

    pub fn write_object(&mut self, scene_index: u32, uniform: &ObjectUniform) -> Result<()> {
        let offset = scene_index as vk::DeviceSize * self.layout.dynamic_stride;
        self.objects.write(offset, bytemuck::bytes_of(uniform))
    }

    /// Layout of the last successful actualize
    pub fn layout(&self) -> &SceneLayout {
        &self.layout
    }

    pub fn sets(&self) -> SceneSets {
        self.sets
    }

    pub fn geometry_handles(&self) -> GeometryHandles {
        GeometryHandles {
            vertex: self.geometry.vertex.handle(&self.placeholders.vertex),
            index: self.geometry.index.handle(&self.placeholders.index),
            instance: self.geometry.instance.handle(&self.placeholders.instance),
        }
    }

    pub fn object_buffer(&self) -> &B::Buffer {
        &self.objects
    }

    /// True after a descriptor or pipeline rebuild failed, until the next actualize works
    /// Drops the recorded draws so nothing references resources about to be freed.
    /// The manager stays stale until the next successful actualize.
    pub fn invalidate(&mut self, backend: &mut B) -> Result<()> {
        self.stale = true;
        backend.clear_draws()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

impl<B: RenderBackend> Destructible for SceneResourceManager<B> {
    fn destroy(&mut self) {
        self.geometry.destroy();
        self.placeholders.vertex.destroy();
        self.placeholders.index.destroy();
        self.placeholders.instance.destroy();
        self.objects.destroy();
        self.camera.destroy();
        self.lights.destroy();
        self.sets = SceneSets::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Event, FakeBackend};

    #[test]
    fn uniform_buffers_are_aligned() {
        let mut backend = FakeBackend::new(256);
        let resources = SceneResourceManager::new(&mut backend).unwrap();
        let sizes: Vec<_> = backend
            .events()
            .into_iter()
            .filter_map(|event| match event {
                Event::CreateUniform { size, .. } => Some(size),
                _ => None,
            })
            .collect();
        // object slots, camera, lights
        assert_eq!(sizes, vec![256, 256, 8192]);
        assert_eq!(resources.object_buffer().size(), 256);
        assert_eq!(resources.sets(), SceneSets::default());
    }

    #[test]
    fn object_writes_land_on_their_slot() {
        let mut backend = FakeBackend::new(0);
        let mut resources = SceneResourceManager::new(&mut backend).unwrap();
        let uniform = ObjectUniform {
            model: glam::Mat4::IDENTITY,
            material: glam::Vec4::ONE,
        };
        resources.write_object(0, &uniform).unwrap();
        assert_eq!(
            &resources.object_buffer().bytes()[..80],
            bytemuck::bytes_of(&uniform)
        );
        // one slot only until the next actualize
        assert!(matches!(
            resources.write_object(1, &uniform),
            Err(TabbyError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn extra_lights_are_ignored() {
        let mut backend = FakeBackend::new(0);
        let mut resources = SceneResourceManager::new(&mut backend).unwrap();
        let lights = vec![LightData::default(); MAX_LIGHTS + 4];
        resources.write_lights(&lights).unwrap();
    }
}
