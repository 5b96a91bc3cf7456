//! A mesh resident in device-local vertex/index buffers.

use std::path::Path;

use anyhow::Result;
use asset::{MeshData, ObjLoadOptions, load_obj_from_path};

use crate::upload::{BufferRole, UploadBackend, upload_via_staging};

/// Uploaded model. Dropping it releases both buffers.
#[derive(Debug)]
pub struct Model<Buf> {
    vertex_buffer: Buf,
    index_buffer: Buf,
    index_count: u32,
    vertex_count: usize,
}

impl<Buf> Model<Buf> {
    /// Upload the vertex array, then the index array.
    pub fn from_mesh<B>(backend: &mut B, mesh: &MeshData, label: &str) -> Result<Self>
    where
        B: UploadBackend<Buffer = Buf>,
    {
        let vertex_buffer = upload_via_staging(
            backend,
            &format!("{label} VB"),
            mesh.vertex_bytes(),
            BufferRole::Vertex,
        )?;
        let index_buffer = upload_via_staging(
            backend,
            &format!("{label} IB"),
            mesh.index_bytes(),
            BufferRole::Index,
        )?;
        log::info!(
            "Uploaded '{}': {} vertices ({} bytes), {} indices ({} bytes)",
            label,
            mesh.vertex_count(),
            mesh.vertex_bytes().len(),
            mesh.index_count(),
            mesh.index_bytes().len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
            vertex_count: mesh.vertex_count(),
        })
    }

    /// Load an OBJ file and upload it.
    pub fn load<B>(backend: &mut B, path: impl AsRef<Path>, opts: &ObjLoadOptions) -> Result<Self>
    where
        B: UploadBackend<Buffer = Buf>,
    {
        let path = path.as_ref();
        let mesh = load_obj_from_path(path, opts)?;
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Model".to_owned());
        Self::from_mesh(backend, &mesh, &label)
    }

    pub fn vertex_buffer(&self) -> &Buf {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &Buf {
        &self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }
}
