//! Headless wgpu context: adapter, device and queue. No surface.

use anyhow::{Context, Result};
use wgpu::{
    Adapter, Backends, Device, DeviceDescriptor, Features, Instance, InstanceDescriptor, Limits,
    PowerPreference, Queue,
};

pub struct GpuContext {
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

impl GpuContext {
    /// Request an adapter and device on the given backends.
    pub async fn new(backends: Backends) -> Result<Self> {
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .with_context(|| format!("No suitable GPU adapter for backends {backends:?}"))?;

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Modelup Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("request_device failed")?;

        // The adapter and device keep the instance's backends alive.
        let ctx = Self {
            adapter,
            device,
            queue,
        };
        log::info!("GPU context ready: {}", ctx.adapter_summary());
        Ok(ctx)
    }

    /// Blocking variant of [`GpuContext::new`].
    pub fn new_blocking(backends: Backends) -> Result<Self> {
        pollster::block_on(Self::new(backends))
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn adapter_summary(&self) -> String {
        let info = self.adapter.get_info();
        format!("{} ({:?}, {:?})", info.name, info.backend, info.device_type)
    }
}

/// Map a user-facing backend name to wgpu backends. `None` for unknown names.
pub fn parse_backend(name: &str) -> Option<Backends> {
    let backends = match name.to_ascii_lowercase().as_str() {
        "auto" => Backends::all(),
        "vulkan" | "vk" => Backends::VULKAN,
        "dx12" | "d3d12" => Backends::DX12,
        "metal" | "mtl" => Backends::METAL,
        "gl" | "opengl" | "gles" => Backends::GL,
        _ => return None,
    };
    Some(backends)
}
