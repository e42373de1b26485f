//! Interleaved position/uv/normal vertex buffer ready for GPU upload.

use bytemuck::{Pod, Zeroable};

use crate::mesh::{Model, Vertex};

/// One packed vertex: position(3), texcoord(2), normal(3). 32 bytes, no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PackedVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

pub const PACKED_VERTEX_SIZE: usize = std::mem::size_of::<PackedVertex>();

impl From<&Vertex> for PackedVertex {
    fn from(v: &Vertex) -> Self {
        Self {
            position: v.position,
            tex_coords: v.tex_coords,
            normal: v.normal,
        }
    }
}

/// Flat byte buffer of [`PackedVertex`] records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackedGeometry {
    bytes: Vec<u8>,
    vertex_count: usize,
}

impl PackedGeometry {
    pub fn with_capacity(vertices: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(vertices * PACKED_VERTEX_SIZE),
            vertex_count: 0,
        }
    }

    pub fn push(&mut self, vertex: PackedVertex) {
        self.bytes.extend_from_slice(bytemuck::bytes_of(&vertex));
        self.vertex_count += 1;
    }

    pub fn from_vertices<'a>(vertices: impl IntoIterator<Item = &'a Vertex>) -> Self {
        let iter = vertices.into_iter();
        let mut packed = Self::with_capacity(iter.size_hint().0);
        for v in iter {
            packed.push(PackedVertex::from(v));
        }
        packed
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }

    /// Read back vertex `i`; the byte buffer carries no alignment guarantee.
    pub fn vertex(&self, i: usize) -> Option<PackedVertex> {
        let start = i.checked_mul(PACKED_VERTEX_SIZE)?;
        let chunk = self.bytes.get(start..start + PACKED_VERTEX_SIZE)?;
        Some(bytemuck::pod_read_unaligned(chunk))
    }
}

/// Pack every vertex of `model`, mesh by mesh. Tangents and bone data are dropped.
///
/// Meshes without vertices contribute nothing; an empty model packs to zero bytes.
pub fn pack_model(model: &Model) -> PackedGeometry {
    let mut packed = PackedGeometry::with_capacity(model.vertex_count());
    for vertex in model.vertices() {
        packed.push(PackedVertex::from(vertex));
    }
    log::debug!(
        "Packed {} vertices into {} bytes",
        packed.vertex_count(),
        packed.bytes().len()
    );
    packed
}
