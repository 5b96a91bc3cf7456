//! wgpu layout for [`asset::Vertex`].

use asset::Vertex;
use wgpu::{IndexFormat, VertexBufferLayout, VertexStepMode};

/// Locations: 0 position, 1 color, 2 tex_coord, 3 normal.
pub const VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x3
    ],
};

pub const INDEX_FORMAT: IndexFormat = IndexFormat::Uint32;
