//! Entry point for modelup: load an OBJ model and upload it to the GPU.
//! Logging via RUST_LOG (default `info`), options as `--key=value` flags.

use anyhow::{Context, Result};
use asset::{ObjLoadOptions, load_obj_with_stats};
use gpu::{GpuContext, GpuModel, Model};

const USAGE: &str = "usage: modelup <model.obj> [--gpu-backend=auto|vulkan|dx12|metal|gl] \
                     [--no-flip-v] [--generate-normals] [--cpu-only]";

fn parse_backend_arg(args: &[String]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = gpu::parse_backend(val).unwrap_or_else(|| {
                log::warn!("Unknown backend '{}', falling back to auto.", val);
                wgpu::Backends::all()
            });
        }
    }
    backends
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_model_path(args: &[String]) -> Option<&str> {
    args.iter().map(String::as_str).find(|a| !a.starts_with("--"))
}

fn load_options(args: &[String]) -> ObjLoadOptions {
    ObjLoadOptions {
        flip_v: !has_flag(args, "--no-flip-v"),
        generate_normals: has_flag(args, "--generate-normals"),
        ..Default::default()
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if has_flag(&args, "--help") {
        println!("{USAGE}");
        return Ok(());
    }
    let path = parse_model_path(&args).context(USAGE)?;
    let opts = load_options(&args);
    let cpu_only = has_flag(&args, "--cpu-only");

    let (mesh, stats) = load_obj_with_stats(path, &opts)?;
    log::info!(
        "{}: {} shapes, {} materials, {} triangles, {} -> {} vertices",
        path,
        stats.shapes,
        stats.materials,
        mesh.triangle_count(),
        stats.corners,
        stats.unique_vertices
    );
    if let Some(aabb) = mesh.bounds() {
        log::info!("Bounds: min={} max={} size={}", aabb.min, aabb.max, aabb.size());
    }

    if cpu_only {
        log::info!("--cpu-only given, skipping GPU upload.");
        return Ok(());
    }

    let backends = parse_backend_arg(&args);
    let mut ctx = GpuContext::new_blocking(backends)?;
    let model: GpuModel = Model::from_mesh(&mut ctx, &mesh, path)?;
    log::info!(
        "GPU buffers: VB {} bytes, IB {} bytes, {} indices ready to draw",
        model.vertex_buffer().size,
        model.index_buffer().size,
        model.index_count()
    );

    Ok(())
}
