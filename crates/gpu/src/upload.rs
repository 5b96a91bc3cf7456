//! Staging-buffer upload into device-local memory.
//!
//! The sequence is fixed: staging buffer (host visible, filled from the CPU)
//! -> device-local buffer -> GPU copy -> staging buffer released.
//! [`UploadBackend`] abstracts the graphics API so the sequence can be driven
//! without a GPU.

use anyhow::{Context, Result};
use corelib::CoreError;
use wgpu::{
    BufferAddress, BufferDescriptor, BufferUsages, COPY_BUFFER_ALIGNMENT, CommandEncoderDescriptor,
    ErrorFilter, MapMode, PollType,
};

use crate::context::GpuContext;

/// What a device-local buffer will be bound as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Vertex,
    Index,
}

impl BufferRole {
    /// `COPY_SRC` is kept so uploaded data can be read back.
    pub fn usage(self) -> BufferUsages {
        let bind = match self {
            BufferRole::Vertex => BufferUsages::VERTEX,
            BufferRole::Index => BufferUsages::INDEX,
        };
        bind | BufferUsages::COPY_DST | BufferUsages::COPY_SRC
    }
}

/// The buffer operations a staging upload needs.
pub trait UploadBackend {
    type Buffer;

    /// Host-visible buffer holding `contents`, usable as a copy source.
    fn create_staging(&mut self, label: &str, contents: &[u8]) -> Result<Self::Buffer>;

    /// Device-local buffer of `size` bytes, usable as a copy destination.
    fn create_device_local(&mut self, label: &str, size: u64, role: BufferRole)
    -> Result<Self::Buffer>;

    /// Copy `size` bytes from `src` to `dst` and wait for completion.
    fn copy_buffer(&mut self, src: &Self::Buffer, dst: &Self::Buffer, size: u64) -> Result<()>;

    fn release_staging(&mut self, buffer: Self::Buffer);
}

/// Upload `bytes` into a new device-local buffer through a staging buffer.
///
/// The staging buffer is released whether or not the copy succeeds.
pub fn upload_via_staging<B: UploadBackend>(
    backend: &mut B,
    label: &str,
    bytes: &[u8],
    role: BufferRole,
) -> Result<B::Buffer> {
    if bytes.is_empty() {
        return Err(CoreError::EmptyUpload {
            label: label.to_owned(),
        }
        .into());
    }
    let size = bytes.len() as u64;
    log::debug!("Uploading '{}': {} bytes as {:?}", label, size, role);

    let staging = backend
        .create_staging(&format!("{label} staging"), bytes)
        .with_context(|| format!("Failed to create staging buffer for '{label}'"))?;

    let uploaded = backend
        .create_device_local(label, size, role)
        .and_then(|dst| {
            backend.copy_buffer(&staging, &dst, size)?;
            Ok(dst)
        });

    backend.release_staging(staging);
    uploaded.with_context(|| format!("Failed to upload '{label}'"))
}

/// Device buffer created by the wgpu backend.
#[derive(Debug)]
pub struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    /// Logical size in bytes; the allocation may be padded to the copy alignment.
    pub size: u64,
    pub role: Option<BufferRole>,
    pub label: String,
}

fn padded(size: u64) -> BufferAddress {
    wgpu::util::align_to(size, COPY_BUFFER_ALIGNMENT)
}

impl GpuContext {
    /// Run `f` inside validation/OOM error scopes, turning captured errors into `CoreError::Gpu`.
    fn scoped<T>(&self, what: &str, f: impl FnOnce(&Self) -> T) -> Result<T> {
        self.device().push_error_scope(ErrorFilter::OutOfMemory);
        self.device().push_error_scope(ErrorFilter::Validation);
        let value = f(self);
        let validation = pollster::block_on(self.device().pop_error_scope());
        let oom = pollster::block_on(self.device().pop_error_scope());
        match validation.or(oom) {
            Some(err) => Err(CoreError::Gpu(format!("{what}: {err}")).into()),
            None => Ok(value),
        }
    }

    fn submit_and_wait(&self, what: &str, encoder: wgpu::CommandEncoder) -> Result<()> {
        let index = self.scoped(what, |ctx| ctx.queue().submit(Some(encoder.finish())))?;
        self.device()
            .poll(PollType::WaitForSubmissionIndex(index))
            .map_err(|e| CoreError::Gpu(e.to_string()))?;
        Ok(())
    }

    /// Copy a device buffer back to the CPU. Intended for checks and debugging.
    pub fn read_buffer(&self, src: &GpuBuffer) -> Result<Vec<u8>> {
        let readback = self.scoped("create readback buffer", |ctx| {
            ctx.device().create_buffer(&BufferDescriptor {
                label: Some("Readback"),
                size: src.buffer.size(),
                usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;

        let mut encoder = self.device().create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(&src.buffer, 0, &readback, 0, src.buffer.size());
        self.submit_and_wait("readback copy", encoder)?;

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device()
            .poll(PollType::Wait)
            .map_err(|e| CoreError::Gpu(e.to_string()))?;
        rx.recv()
            .context("Readback map callback never ran")?
            .map_err(|e| CoreError::Gpu(e.to_string()))?;

        let data = {
            let view = slice.get_mapped_range();
            view[..src.size as usize].to_vec()
        };
        readback.unmap();
        Ok(data)
    }
}

impl UploadBackend for GpuContext {
    type Buffer = GpuBuffer;

    fn create_staging(&mut self, label: &str, contents: &[u8]) -> Result<GpuBuffer> {
        let buffer = self.scoped("create staging buffer", |ctx| {
            ctx.device().create_buffer(&BufferDescriptor {
                label: Some(label),
                size: padded(contents.len() as u64),
                usage: BufferUsages::MAP_WRITE | BufferUsages::COPY_SRC,
                mapped_at_creation: true,
            })
        })?;
        {
            let mut view = buffer.slice(..).get_mapped_range_mut();
            view[..contents.len()].copy_from_slice(contents);
        }
        buffer.unmap();

        Ok(GpuBuffer {
            buffer,
            size: contents.len() as u64,
            role: None,
            label: label.to_owned(),
        })
    }

    fn create_device_local(&mut self, label: &str, size: u64, role: BufferRole) -> Result<GpuBuffer> {
        let buffer = self.scoped("create device-local buffer", |ctx| {
            ctx.device().create_buffer(&BufferDescriptor {
                label: Some(label),
                size: padded(size),
                usage: role.usage(),
                mapped_at_creation: false,
            })
        })?;
        Ok(GpuBuffer {
            buffer,
            size,
            role: Some(role),
            label: label.to_owned(),
        })
    }

    fn copy_buffer(&mut self, src: &GpuBuffer, dst: &GpuBuffer, size: u64) -> Result<()> {
        let mut encoder = self.device().create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Upload Encoder"),
        });
        encoder.copy_buffer_to_buffer(&src.buffer, 0, &dst.buffer, 0, padded(size));
        self.submit_and_wait("staging copy", encoder)
    }

    fn release_staging(&mut self, buffer: GpuBuffer) {
        log::debug!("Releasing '{}'", buffer.label);
        buffer.buffer.destroy();
    }
}
