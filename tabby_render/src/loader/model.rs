use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Vec2, Vec3};
use tabby_vk::types::Vertex;
use tracing::debug;

use crate::mesh::Mesh;

/// Loads meshes, sharing one [`Mesh`] between every load of the same file
pub trait ModelLoader {
    fn load_model(&mut self, path: &Path) -> anyhow::Result<Arc<Mesh>>;

    /// Forgets `mesh` so the next load of its file reads it again
    fn remove_from_cache(&mut self, mesh: &Mesh);
}

/// Wavefront OBJ through `tobj`. Faces are triangulated and every index becomes its own
/// vertex.
#[derive(Debug, Default)]
pub struct ObjModelLoader {
    cache: HashMap<PathBuf, Arc<Mesh>>,
}

impl ObjModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(path: &Path) -> anyhow::Result<Mesh> {
        let options = tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        };
        let (models, _materials) = tobj::load_obj(path, &options)?;

        let mut vertices = Vec::new();
        for model in &models {
            let mesh = &model.mesh;
            for &index in &mesh.indices {
                let i = index as usize;
                let pos = Vec3::from_slice(&mesh.positions[3 * i..3 * i + 3]);
                let color = if mesh.vertex_color.len() >= 3 * i + 3 {
                    Vec3::from_slice(&mesh.vertex_color[3 * i..3 * i + 3])
                } else {
                    Vec3::ONE
                };
                let tex_coord = if mesh.texcoords.len() >= 2 * i + 2 {
                    // OBJ puts v = 0 at the bottom
                    Vec2::new(mesh.texcoords[2 * i], 1.0 - mesh.texcoords[2 * i + 1])
                } else {
                    Vec2::ZERO
                };
                let normal = if mesh.normals.len() >= 3 * i + 3 {
                    Vec3::from_slice(&mesh.normals[3 * i..3 * i + 3])
                } else {
                    Vec3::ZERO
                };
                vertices.push(Vertex {
                    pos,
                    color,
                    tex_coord,
                    normal,
                });
            }
        }
        let indices = (0..vertices.len() as u32).collect();
        debug!("Loaded {} with {} vertices", path.display(), vertices.len());
        Ok(Mesh::new(path, vertices, indices))
    }
}

impl ModelLoader for ObjModelLoader {
    fn load_model(&mut self, path: &Path) -> anyhow::Result<Arc<Mesh>> {
        if path.as_os_str().is_empty() {
            return Ok(Arc::new(Mesh::default()));
        }
        if let Some(mesh) = self.cache.get(path) {
            return Ok(mesh.clone());
        }
        let mesh = Arc::new(Self::read(path)?);
        self.cache.insert(path.to_path_buf(), mesh.clone());
        Ok(mesh)
    }

    fn remove_from_cache(&mut self, mesh: &Mesh) {
        self.cache.remove(&mesh.filename);
    }
}
