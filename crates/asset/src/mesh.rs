//! CPU-side mesh representation used by loaders.

use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
};

use bytemuck::{Pod, Zeroable};
use corelib::{CoreError, CoreResult};
use glam::Vec3;

/// Vertex with position/color/uv/normal. Values are in object space.
///
/// Layout is `#[repr(C)]` and tightly packed (44 bytes), so a slice of vertices
/// can be handed to the GPU as-is.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub tex_coord: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    pub fn new(position: [f32; 3], color: [f32; 3], tex_coord: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            color,
            tex_coord,
            normal,
        }
    }

    fn bits(&self) -> [u32; 11] {
        bytemuck::cast(*self)
    }
}

// Bitwise comparison keeps Eq and Hash consistent for floats.
impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Axis-aligned bounding box of a mesh's positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Indexed triangle mesh with tightly-packed vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Returns `true` if both vertex and index buffers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of indices, as used for an indexed draw call.
    pub fn index_count(&self) -> u32 {
        // VertexDeduper guarantees the index list fits in u32.
        self.indices.len() as u32
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Bounds over all vertex positions, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Aabb> {
        let mut iter = self.vertices.iter().map(|v| Vec3::from_array(v.position));
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Aabb { min, max })
    }
}

/// Collapses identical vertices into a unique vertex array plus an index list.
#[derive(Debug, Default)]
pub struct VertexDeduper {
    unique: HashMap<Vertex, u32>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl VertexDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(corners: usize) -> Self {
        Self {
            unique: HashMap::with_capacity(corners),
            vertices: Vec::with_capacity(corners),
            indices: Vec::with_capacity(corners),
        }
    }

    /// Append one corner. Returns the index assigned to `vertex`.
    pub fn push(&mut self, vertex: Vertex) -> CoreResult<u32> {
        if self.indices.len() >= u32::MAX as usize {
            return Err(CoreError::IndexOverflow {
                count: self.indices.len() + 1,
            });
        }
        let index = match self.unique.get(&vertex) {
            Some(&idx) => idx,
            None => {
                let idx = u32::try_from(self.vertices.len()).map_err(|_| {
                    CoreError::IndexOverflow {
                        count: self.vertices.len() + 1,
                    }
                })?;
                self.vertices.push(vertex);
                self.unique.insert(vertex, idx);
                idx
            }
        };
        self.indices.push(index);
        Ok(index)
    }

    pub fn unique_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn corner_count(&self) -> usize {
        self.indices.len()
    }

    pub fn finish(self) -> MeshData {
        MeshData::new(self.vertices, self.indices)
    }
}
