//! Everything that gets drawn: objects, instances, materials, lights and the camera.
//!
//! Changes to the object, instance and material lists reach the GPU on the next
//! [`Scene::actualize`]. Transforms, lights and the camera are uploaded by
//! [`Scene::update`] every frame.
use std::path::Path;
use std::sync::Arc;

use derivative::Derivative;
use glam::Vec4;
use tabby_vk::traits::Destructible;
use tabby_vk::{Result, TabbyError};
use tracing::{info, warn};

use crate::backend::RenderBackend;
use crate::camera::{Camera, DEFAULT_WORLD_AMBIENT};
use crate::frame::{self, FrameInputs};
use crate::light::{Light, LightId, MAX_LIGHTS};
use crate::loader::{ImageTextureLoader, ModelLoader, ObjModelLoader, TextureLoader};
use crate::material::{Material, MaterialId};
use crate::mesh::Mesh;
use crate::object::{InstanceId, InstancedObject, Object, ObjectId};
use crate::resources::SceneResourceManager;

const WHITE_TEXEL: [u8; 4] = [255; 4];

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Scene<B: RenderBackend> {
    resources: SceneResourceManager<B>,
    objects: Vec<Object>,
    instances: Vec<InstancedObject>,
    materials: Vec<Material<B::Texture>>,
    lights: Vec<Light>,
    camera: Camera,
    world_ambient: Vec4,
    #[derivative(Debug = "ignore")]
    texture_loader: Box<dyn TextureLoader>,
    #[derivative(Debug = "ignore")]
    model_loader: Box<dyn ModelLoader>,
    next_object: u64,
    next_instance: u64,
}

impl<B: RenderBackend> Scene<B> {
    /// Creates the scene GPU state and the default white material. Missing loaders are
    /// replaced with [`ImageTextureLoader`] and [`ObjModelLoader`].
    pub fn new(
        backend: &mut B,
        texture_loader: Option<Box<dyn TextureLoader>>,
        model_loader: Option<Box<dyn ModelLoader>>,
    ) -> Result<Self> {
        let mut resources = SceneResourceManager::new(backend)?;
        let texture = match backend.create_texture(1, 1, &WHITE_TEXEL) {
            Ok(texture) => texture,
            Err(err) => {
                resources.destroy();
                return Err(err);
            }
        };
        Ok(Self {
            resources,
            objects: Vec::new(),
            instances: Vec::new(),
            materials: vec![Material::new(texture)],
            lights: Vec::new(),
            camera: Camera::default(),
            world_ambient: DEFAULT_WORLD_AMBIENT,
            texture_loader: texture_loader.unwrap_or_else(|| Box::new(ImageTextureLoader)),
            model_loader: model_loader.unwrap_or_else(|| Box::new(ObjModelLoader::new())),
            next_object: 0,
            next_instance: 0,
        })
    }

    pub fn load_model(&mut self, path: impl AsRef<Path>) -> Result<ObjectId> {
        let path = path.as_ref();
        let mesh = self
            .model_loader
            .load_model(path)
            .map_err(|err| TabbyError::ModelLoad {
                path: path.to_path_buf(),
                reason: format!("{err:#}"),
            })?;
        Ok(self.add_mesh(mesh))
    }

    /// Places `mesh` as a new object with the default material
    pub fn add_mesh(&mut self, mesh: Arc<Mesh>) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.objects.push(Object::new(id, mesh));
        id
    }

    /// Removes the object and its instances. The mesh is evicted from the loader cache
    /// once no other object uses it.
    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        let Some(position) = self.objects.iter().position(|object| object.id() == id) else {
            return false;
        };
        let object = self.objects.remove(position);
        self.instances.retain(|instance| instance.parent() != id);
        let shared = self
            .objects
            .iter()
            .any(|other| Arc::ptr_eq(other.mesh(), object.mesh()));
        if !shared {
            self.model_loader.remove_from_cache(object.mesh());
        }
        true
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.iter().find(|object| object.id() == id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.iter_mut().find(|object| object.id() == id)
    }

    /// Objects in draw order
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    /// Instances `parent`, [`None`] if there is no such object
    pub fn create_instance(&mut self, parent: ObjectId) -> Option<InstanceId> {
        let object = self.object_mut(parent)?;
        object.add_instance();
        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        self.instances.push(InstancedObject::new(id, parent));
        Some(id)
    }

    pub fn remove_instance(&mut self, id: InstanceId) -> bool {
        let Some(position) = self.instances.iter().position(|instance| instance.id() == id)
        else {
            return false;
        };
        let instance = self.instances.remove(position);
        if let Some(parent) = self.object_mut(instance.parent()) {
            parent.remove_instance();
        }
        true
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut InstancedObject> {
        self.instances.iter_mut().find(|instance| instance.id() == id)
    }

    pub fn instances(&self) -> &[InstancedObject] {
        &self.instances
    }

    /// Decodes an image into a new material. An empty path gives a white texel.
    pub fn load_image_texture(
        &mut self,
        backend: &mut B,
        path: impl AsRef<Path>,
    ) -> Result<MaterialId> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return self.create_texture(backend, 1, 1, &WHITE_TEXEL);
        }
        let image = self
            .texture_loader
            .load_image(path)
            .map_err(|err| TabbyError::TextureLoad {
                path: path.to_path_buf(),
                reason: format!("{err:#}"),
            })?;
        self.create_texture(backend, image.width, image.height, &image.pixels)
    }

    /// New material from tightly packed RGBA8 pixels
    pub fn create_texture(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<MaterialId> {
        tabby_vk::resource::texture::validate_rgba(width, height, pixels)?;
        let texture = backend.create_texture(width, height, pixels)?;
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(Material::new(texture));
        Ok(id)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material<B::Texture>> {
        self.materials.get(id.index())
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material<B::Texture>> {
        self.materials.get_mut(id.index())
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Adds a light. Once [`MAX_LIGHTS`] exist the last light is returned instead.
    pub fn create_light(&mut self) -> LightId {
        if self.lights.len() >= MAX_LIGHTS {
            warn!(
                "No more dynamic lights available, the maximum is {}. Returning the last light.",
                MAX_LIGHTS
            );
            return LightId(self.lights.len() as u32 - 1);
        }
        self.lights.push(Light::default());
        LightId(self.lights.len() as u32 - 1)
    }

    pub fn light_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.get_mut(id.0 as usize)
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn world_ambient(&self) -> Vec4 {
        self.world_ambient
    }

    pub fn set_world_ambient(&mut self, ambient: Vec4) {
        self.world_ambient = ambient;
    }

    pub fn resources(&self) -> &SceneResourceManager<B> {
        &self.resources
    }

    /// Uploads everything that changed since the last actualize and re-records the draws
    pub fn actualize(&mut self, backend: &mut B) -> Result<()> {
        self.resources.actualize(
            backend,
            &mut self.objects,
            &self.instances,
            &mut self.materials,
            self.lights.len() as u32,
        )
    }

    /// Writes the per frame uniforms
    pub fn update(&mut self, backend: &B) -> Result<()> {
        frame::write_uniforms(
            &mut self.resources,
            FrameInputs {
                camera: &self.camera,
                world_ambient: self.world_ambient,
                extent: backend.extent(),
                lights: &self.lights,
                objects: &self.objects,
                materials: &self.materials,
            },
        )
    }

    /// Drops every object, instance, light and material except the default one, then
    /// actualizes
    pub fn clear(&mut self, backend: &mut B) -> Result<()> {
        for object in self.objects.drain(..) {
            self.model_loader.remove_from_cache(object.mesh());
        }
        self.instances.clear();
        self.lights.clear();
        if self.materials.len() > 1 {
            self.resources.invalidate(backend)?;
            backend.wait_idle()?;
            for mut material in self.materials.drain(1..) {
                material.destroy();
            }
        }
        info!("Scene cleared");
        self.actualize(backend)
    }
}

impl<B: RenderBackend> Destructible for Scene<B> {
    fn destroy(&mut self) {
        for material in &mut self.materials {
            material.destroy();
        }
        self.materials.clear();
        self.resources.destroy();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::rc::Rc;

    use glam::Vec3;
    use tabby_vk::ash::vk::{self, Handle};
    use tabby_vk::command::{DrawCommand, PipelineKind};
    use tabby_vk::types::{ObjectUniform, Vertex};

    use super::*;
    use crate::backend::{GpuBuffer, GpuTexture, UniformBinding};
    use crate::material::MaterialProperties;
    use crate::fake::{Event, FakeBackend};

    fn mesh(name: &str, vertices: usize) -> Arc<Mesh> {
        Arc::new(Mesh::new(
            name,
            vec![Vertex::default(); vertices],
            (0..vertices as u32).collect(),
        ))
    }

    fn scene(backend: &mut FakeBackend) -> Scene<FakeBackend> {
        Scene::new(backend, None, None).unwrap()
    }

    #[derive(Default)]
    struct SharedLoader {
        cache: HashMap<PathBuf, Arc<Mesh>>,
        evicted: Rc<RefCell<Vec<PathBuf>>>,
    }

    impl ModelLoader for SharedLoader {
        fn load_model(&mut self, path: &Path) -> anyhow::Result<Arc<Mesh>> {
            let mesh = self
                .cache
                .entry(path.to_path_buf())
                .or_insert_with(|| mesh(&path.to_string_lossy(), 3));
            Ok(mesh.clone())
        }

        fn remove_from_cache(&mut self, mesh: &Mesh) {
            self.evicted.borrow_mut().push(mesh.filename.clone());
            self.cache.remove(&mesh.filename);
        }
    }

    #[test]
    fn empty_scene_binds_placeholders() {
        let mut backend = FakeBackend::new(256);
        let mut scene = scene(&mut backend);
        scene.actualize(&mut backend).unwrap();

        let events = backend.events();
        assert!(
            !events
                .iter()
                .any(|event| matches!(event, Event::CreateGeometry { .. }))
        );
        // placeholders are the first buffers created
        let handles = scene.resources().geometry_handles();
        assert_eq!(handles.vertex, vk::Buffer::from_raw(1));
        assert_eq!(handles.index, vk::Buffer::from_raw(2));
        assert_eq!(handles.instance, vk::Buffer::from_raw(3));
        assert_eq!(scene.resources().object_buffer().size(), 256);
        assert!(backend.draw_list.is_empty());
        assert!(!backend.instancing);
        assert!(events.contains(&Event::RebuildPool(1)));
    }

    #[test]
    fn objects_share_combined_buffers() {
        let mut backend = FakeBackend::new(256);
        let mut scene = scene(&mut backend);
        let first = scene.add_mesh(mesh("a", 3));
        let second = scene.add_mesh(mesh("b", 5));
        scene.actualize(&mut backend).unwrap();

        assert_eq!(scene.resources().layout().vertices.len(), 8);
        let first = scene.object(first).unwrap();
        let second = scene.object(second).unwrap();
        assert_eq!((first.scene_index(), first.vertex_offset()), (Some(0), 0));
        assert_eq!((second.scene_index(), second.vertex_offset()), (Some(1), 3));
        assert_eq!(second.first_index(), 3);
        assert_eq!(scene.resources().object_buffer().size(), 512);

        let draws: Vec<_> = backend.draw_list.draws().collect();
        assert_eq!(draws.len(), 2);
        assert!(matches!(
            draws[1],
            (
                Some(PipelineKind::Main),
                DrawCommand::DrawIndexed {
                    index_count: 5,
                    instance_count: 1,
                    first_index: 3,
                    vertex_offset: 3,
                    ..
                }
            )
        ));
        assert!(backend.events().contains(&Event::AllocateUniform {
            binding: UniformBinding::Object,
            range: 256,
        }));
    }

    #[test]
    fn instances_of_one_object_are_one_draw() {
        let mut backend = FakeBackend::new(64);
        let mut scene = scene(&mut backend);
        let parent = scene.add_mesh(mesh("cube", 36));
        for i in 0..4 {
            let instance = scene.create_instance(parent).unwrap();
            scene.instance_mut(instance).unwrap().data.pos = Vec3::new(i as f32, 0.0, 0.0);
        }
        assert_eq!(scene.object(parent).unwrap().instance_count(), 4);
        scene.actualize(&mut backend).unwrap();

        let instanced: Vec<_> = backend
            .draw_list
            .draws()
            .filter(|(kind, _)| *kind == Some(PipelineKind::Instancing))
            .collect();
        assert_eq!(instanced.len(), 1);
        assert!(matches!(
            instanced[0].1,
            DrawCommand::DrawIndexed {
                index_count: 36,
                instance_count: 4,
                first_instance: 0,
                ..
            }
        ));
        assert!(backend.instancing);
        assert_eq!(scene.resources().layout().instances.len(), 4);
    }

    #[test]
    fn instancing_needs_an_existing_parent() {
        let mut backend = FakeBackend::new(64);
        let mut scene = scene(&mut backend);
        let parent = scene.add_mesh(mesh("a", 3));
        scene.remove_object(parent);
        assert_eq!(scene.create_instance(parent), None);
    }

    #[test]
    fn failed_upload_keeps_live_buffers() {
        let mut backend = FakeBackend::new(256);
        let mut scene = scene(&mut backend);
        scene.add_mesh(mesh("a", 3));
        scene.actualize(&mut backend).unwrap();
        let before = scene.resources().geometry_handles();
        let draws_before = backend.draw_list.clone();

        scene.add_mesh(mesh("b", 5));
        backend.fail_index_uploads = true;
        backend.clear_events();
        let err = scene.actualize(&mut backend).unwrap_err();
        assert!(matches!(err, TabbyError::BufferCreate(_)));

        let events = backend.events();
        let staged = events
            .iter()
            .find_map(|event| match event {
                Event::CreateGeometry { handle, .. } => Some(*handle),
                _ => None,
            })
            .unwrap();
        assert!(events.contains(&Event::DestroyBuffer(staged)));
        assert!(!events.contains(&Event::DestroyBuffer(before.vertex)));
        assert!(!events.contains(&Event::WaitIdle));
        assert_eq!(scene.resources().geometry_handles(), before);
        assert_eq!(scene.resources().layout().vertices.len(), 3);
        assert_eq!(backend.draw_list, draws_before);
        assert!(!scene.resources().is_stale());
    }

    #[test]
    fn old_buffers_die_after_wait_idle() {
        let mut backend = FakeBackend::new(256);
        let mut scene = scene(&mut backend);
        scene.add_mesh(mesh("a", 3));
        scene.actualize(&mut backend).unwrap();
        let before = scene.resources().geometry_handles();

        backend.clear_events();
        scene.actualize(&mut backend).unwrap();
        let events = backend.events();
        let idle = events.iter().position(|e| *e == Event::WaitIdle).unwrap();
        let destroyed = events
            .iter()
            .position(|e| *e == Event::DestroyBuffer(before.vertex))
            .unwrap();
        assert!(idle < destroyed);
        assert_ne!(scene.resources().geometry_handles().vertex, before.vertex);
    }

    #[test]
    fn failed_rebuild_marks_stale_and_clears_draws() {
        let mut backend = FakeBackend::new(256);
        let mut scene = scene(&mut backend);
        scene.add_mesh(mesh("a", 3));
        scene.actualize(&mut backend).unwrap();
        assert!(!backend.draw_list.is_empty());

        backend.fail_graphics = true;
        assert!(scene.actualize(&mut backend).is_err());
        assert!(scene.resources().is_stale());
        assert!(backend.events().contains(&Event::ClearDraws));
        assert!(backend.draw_list.is_empty());

        backend.fail_graphics = false;
        scene.actualize(&mut backend).unwrap();
        assert!(!scene.resources().is_stale());
        assert!(!backend.draw_list.is_empty());
    }

    #[test]
    fn lights_are_capped() {
        let mut backend = FakeBackend::new(256);
        let mut scene = scene(&mut backend);
        for _ in 0..MAX_LIGHTS {
            scene.create_light();
        }
        let extra = scene.create_light();
        assert_eq!(scene.lights().len(), MAX_LIGHTS);
        assert_eq!(extra, LightId(MAX_LIGHTS as u32 - 1));
    }

    #[test]
    fn mesh_evicted_once_unused() {
        let mut backend = FakeBackend::new(256);
        let evicted = Rc::new(RefCell::new(Vec::new()));
        let loader = SharedLoader {
            evicted: evicted.clone(),
            ..Default::default()
        };
        let mut scene = Scene::new(&mut backend, None, Some(Box::new(loader))).unwrap();
        let first = scene.load_model("cube.obj").unwrap();
        let second = scene.load_model("cube.obj").unwrap();
        scene.create_instance(first).unwrap();
        scene.create_instance(first).unwrap();

        assert!(scene.remove_object(first));
        assert!(evicted.borrow().is_empty());
        assert!(scene.instances().is_empty());

        assert!(scene.remove_object(second));
        assert_eq!(*evicted.borrow(), vec![PathBuf::from("cube.obj")]);
        assert!(!scene.remove_object(second));
    }

    #[test]
    fn textures_become_materials() {
        let mut backend = FakeBackend::new(256);
        let mut scene = scene(&mut backend);
        assert_eq!(scene.material_count(), 1);

        let short = scene.create_texture(&mut backend, 2, 2, &[0; 15]);
        assert!(matches!(short, Err(TabbyError::TextureLoad { .. })));
        assert_eq!(
            scene.create_texture(&mut backend, 2, 2, &[0; 16]).unwrap(),
            MaterialId(1)
        );
        assert_eq!(
            scene.load_image_texture(&mut backend, "").unwrap(),
            MaterialId(2)
        );
        let missing = scene.load_image_texture(&mut backend, "/nonexistent/tabby.png");
        assert!(matches!(missing, Err(TabbyError::TextureLoad { .. })));
        assert_eq!(scene.material_count(), 3);

        scene.actualize(&mut backend).unwrap();
        assert!(backend.events().contains(&Event::RebuildPool(3)));
        assert!(
            (0..3).all(|i| scene.material(MaterialId(i)).unwrap().descriptor_set()
                != vk::DescriptorSet::null())
        );
    }

    #[test]
    fn update_writes_object_slots() {
        let mut backend = FakeBackend::new(256);
        let mut scene = scene(&mut backend);
        scene.add_mesh(mesh("a", 3));
        let moved = scene.add_mesh(mesh("b", 3));
        scene.actualize(&mut backend).unwrap();
        scene.object_mut(moved).unwrap().transform.position = Vec3::new(1.0, 2.0, 3.0);
        // not actualized yet, so it has no slot
        scene.add_mesh(mesh("c", 3));
        scene.update(&backend).unwrap();

        let object = scene.object(moved).unwrap();
        let expected = ObjectUniform {
            model: object.transform.matrix(),
            material: MaterialProperties::default().packed(),
        };
        let bytes = scene.resources().object_buffer().bytes();
        assert_eq!(&bytes[256..336], bytemuck::bytes_of(&expected));
    }

    #[test]
    fn clear_keeps_only_the_default_material() {
        let mut backend = FakeBackend::new(256);
        let mut scene = scene(&mut backend);
        scene.add_mesh(mesh("a", 3));
        scene.create_light();
        scene.create_texture(&mut backend, 1, 1, &[0; 4]).unwrap();
        scene.actualize(&mut backend).unwrap();

        let view = scene.material(MaterialId(1)).unwrap().texture().view();
        scene.clear(&mut backend).unwrap();
        assert!(scene.objects().is_empty());
        assert!(scene.lights().is_empty());
        assert_eq!(scene.material_count(), 1);
        assert!(backend.events().contains(&Event::DestroyTexture(view)));
        assert!(backend.draw_list.is_empty());
    }

    #[test]
    fn failed_clear_leaves_no_draws_on_freed_materials() {
        let mut backend = FakeBackend::new(256);
        let mut scene = scene(&mut backend);
        let object = scene.add_mesh(mesh("a", 3));
        let material = scene.create_texture(&mut backend, 1, 1, &[0; 4]).unwrap();
        scene.object_mut(object).unwrap().material = material;
        scene.actualize(&mut backend).unwrap();
        assert!(!backend.draw_list.is_empty());

        backend.fail_uniforms = true;
        assert!(scene.clear(&mut backend).is_err());
        assert_eq!(scene.material_count(), 1);
        assert!(backend.draw_list.is_empty());
        assert!(scene.resources().is_stale());

        backend.fail_uniforms = false;
        scene.clear(&mut backend).unwrap();
        assert!(!scene.resources().is_stale());
    }
}
