//! Shared setup for GPU-backed tests.
//!
//! Each test builds its own headless context. Machines without any usable
//! adapter skip instead of failing.

use std::path::PathBuf;

use glint_engine::logging::{init_logging, LoggingConfig};
use glint_engine::{Gpu, GpuInit};

/// Headless context, or `None` (with a notice) when no adapter is available.
pub fn headless_gpu() -> Option<Gpu> {
    init_logging(LoggingConfig {
        env_filter: Some("warn".to_string()),
        ..LoggingConfig::default()
    });

    match pollster::block_on(Gpu::headless(GpuInit::headless())) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("no GPU adapter available, skipping: {e:#}");
            None
        }
    }
}

/// Per-process scratch path so parallel test binaries do not collide.
pub fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("glint-test-{}-{name}", std::process::id()))
}

/// Writes `contents` to a scratch file and returns its path.
#[allow(dead_code)]
pub fn write_scratch(name: &str, contents: &str) -> PathBuf {
    let path = scratch(name);
    std::fs::write(&path, contents).expect("write scratch file");
    path
}

#[allow(dead_code)]
pub const TEXTURED_VS: &str = r#"
@group(0) @binding(0) var<uniform> model: mat4x4<f32>;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) pos: vec3<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.pos = model * vec4<f32>(pos, 1.0);
    out.uv = uv;
    return out;
}
"#;

#[allow(dead_code)]
pub const TEXTURED_FS: &str = r#"
@group(1) @binding(0) var albedo: texture_2d<f32>;
@group(1) @binding(1) var albedo_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(albedo, albedo_sampler, uv);
}
"#;

#[allow(dead_code)]
pub const DOUBLE_CS: &str = r#"
@group(0) @binding(0) var<storage, read_write> values: array<u32>;

@compute @workgroup_size(4)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    values[id.x] = values[id.x] * 2u;
}
"#;
