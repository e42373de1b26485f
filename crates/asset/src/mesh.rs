//! CPU-side mesh representation shared by all loaders.

use glam::Vec3;

use crate::texture::Texture;

/// Maximum number of bones that can influence a single vertex.
pub const MAX_BONE_INFLUENCE: usize = 4;

/// Vertex with every attribute a renderer may ask for. Values are in object space.
///
/// Bone ids and weights are carried for skinned formats but never filled in here.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub bone_ids: [i32; MAX_BONE_INFLUENCE],
    pub bone_weights: [f32; MAX_BONE_INFLUENCE],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coords,
            ..Self::default()
        }
    }

    /// Largest absolute coordinate of the position.
    #[inline]
    pub fn max_abs_coord(&self) -> f32 {
        Vec3::from_array(self.position).abs().max_element()
    }
}

/// Indexed triangle list plus the textures of its material.
#[derive(Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub textures: Vec<Texture>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, textures: Vec<Texture>) -> Self {
        Self {
            vertices,
            indices,
            textures,
        }
    }

    /// Returns `true` if both vertex and index buffers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// A loaded asset: meshes in depth-first scene order.
///
/// Shared read-only between the cache and any number of renderers.
#[derive(Debug, Default)]
pub struct Model {
    pub meshes: Vec<Mesh>,
}

/// Extent reported for models that are smaller than unit size, or cannot be loaded.
pub const MIN_EXTENT: f32 = 1.0;

impl Model {
    pub fn new(meshes: Vec<Mesh>) -> Self {
        Self { meshes }
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len()).sum()
    }

    pub fn texture_count(&self) -> usize {
        self.meshes.iter().map(|m| m.textures.len()).sum()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.meshes.iter().flat_map(|m| m.vertices.iter())
    }

    pub fn textures(&self) -> impl Iterator<Item = &Texture> {
        self.meshes.iter().flat_map(|m| m.textures.iter())
    }

    /// Maximum absolute coordinate over all vertex positions, never below [`MIN_EXTENT`].
    pub fn max_extent(&self) -> f32 {
        self.vertices()
            .map(Vertex::max_abs_coord)
            .fold(MIN_EXTENT, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_validity() {
        let mesh = Mesh::new(vec![Vertex::default()], vec![0], Vec::new());
        assert!(mesh.is_valid());
        assert!(!Mesh::default().is_valid());
    }

    #[test]
    fn counts_span_all_meshes() {
        let a = Mesh::new(vec![Vertex::default(); 3], vec![0, 1, 2], Vec::new());
        let b = Mesh::new(vec![Vertex::default(); 4], vec![0, 1, 2, 0, 2, 3], Vec::new());
        let model = Model::new(vec![a, b]);
        assert_eq!(model.vertex_count(), 7);
        assert_eq!(model.index_count(), 9);
        assert_eq!(model.meshes[1].triangle_count(), 2);
    }

    #[test]
    fn extent_uses_absolute_coordinates() {
        let v = |p: [f32; 3]| Vertex::new(p, [0.0, 0.0, 1.0], [0.0, 0.0]);
        let model = Model::new(vec![Mesh::new(
            vec![v([0.5, 2.0, -7.5]), v([3.0, -1.0, 0.0])],
            vec![],
            Vec::new(),
        )]);
        assert_eq!(model.max_extent(), 7.5);
    }

    #[test]
    fn extent_has_unit_floor() {
        let small = Vertex::new([0.1, -0.2, 0.3], [0.0; 3], [0.0; 2]);
        let model = Model::new(vec![Mesh::new(vec![small], vec![], Vec::new())]);
        assert_eq!(model.max_extent(), MIN_EXTENT);
        assert_eq!(Model::default().max_extent(), MIN_EXTENT);
    }
}
