use std::path::PathBuf;

use tabby_vk::types::Vertex;

/// Geometry of one model. Indices are local to the mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Cache key of the loader which produced the mesh
    pub filename: PathBuf,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new(filename: impl Into<PathBuf>, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            filename: filename.into(),
            vertices,
            indices,
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}
