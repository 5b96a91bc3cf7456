//! GPU side: headless wgpu context and staging uploads of meshes into
//! device-local vertex/index buffers.
//! wgpu = 26.x

pub mod context;
pub mod model;
pub mod upload;
pub mod vertex;

pub use context::{GpuContext, parse_backend};
pub use model::Model;
pub use upload::{BufferRole, GpuBuffer, UploadBackend, upload_via_staging};
pub use vertex::{INDEX_FORMAT, VERTEX_LAYOUT};

/// A model living in wgpu buffers.
pub type GpuModel = Model<GpuBuffer>;
