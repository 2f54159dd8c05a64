use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use glam::{Mat4, Vec2, Vec3};
use image::RgbaImage;

use glint_engine::loader::{
    load_framebuffer, load_texture, load_vertex_array, resize_framebuffer, texture_from_rgba,
    FrameBufferObject, Texture, VertexArrayObject,
};
use glint_engine::logging::{init_logging, LoggingConfig};
use glint_engine::render::RenderTarget;
use glint_engine::shader::{create_program, ShaderProgram, UniformLocation};
use glint_engine::{Display, Gpu};

/// Spinning textured cube rendered offscreen, then composited to the window
/// through a vignette pass.
///
/// Usage: `glint-viewer [ASSET_DIR]`. `ASSET_DIR/shaders/` overrides the
/// bundled shaders and `ASSET_DIR/albedo.png` the checkerboard texture.
fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let assets = std::env::args().nth(1).map(PathBuf::from);
    let shader_dir = assets
        .as_ref()
        .map(|dir| dir.join("shaders"))
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders")));

    log::info!("shaders: {}", shader_dir.display());

    let mut display = Display::create(1280, 720, "glint viewer")?;

    let (scene, post, texture, cube, quad, mut fbo) = {
        let gpu = display.gpu();
        let scene = ScenePass::new(gpu, &shader_dir)?;
        let post = PostPass::new(gpu, &shader_dir)?;
        let texture = albedo(gpu, assets.as_deref())?;
        let cube = cube_mesh(gpu)?;
        let quad = fullscreen_quad(gpu)?;
        let size = display.window().inner_size();
        let fbo = load_framebuffer(gpu, size.width.max(1), size.height.max(1));
        (scene, post, texture, cube, quad, fbo)
    };

    let start = Instant::now();
    while !display.should_close() {
        let aspect = display.aspect();
        let size = display.window().inner_size();
        if size.width > 0 && size.height > 0 {
            resize_framebuffer(display.gpu(), &mut fbo, size.width, size.height);
        }

        if let Some(frame) = display.frame()? {
            let t = start.elapsed().as_secs_f32();
            scene.draw(frame.gpu, &fbo, &cube, &texture, t, aspect);
            post.draw(frame.gpu, &frame.screen, &quad, &fbo);
        }
        display.refresh();
    }

    scene.program.free();
    post.program.free();
    texture.free();
    cube.free();
    quad.free();
    fbo.free();
    display.free();
    Ok(())
}

struct ScenePass {
    program: ShaderProgram,
    model: Option<UniformLocation>,
    view_proj: Option<UniformLocation>,
    light_dir: Option<UniformLocation>,
    albedo: Option<UniformLocation>,
}

impl ScenePass {
    fn new(gpu: &Gpu, shader_dir: &Path) -> Result<Self> {
        let program = create_program(
            gpu,
            shader_dir.join("cube.vs.wgsl"),
            shader_dir.join("cube.fs.wgsl"),
        )
        .context("failed to load cube shaders")?;
        anyhow::ensure!(
            program.is_usable(),
            "cube program is unusable: {:?}",
            program.status()
        );

        Ok(Self {
            model: program.find_uniform("transform.model"),
            view_proj: program.find_uniform("transform.view_proj"),
            light_dir: program.find_uniform("transform.light_dir"),
            albedo: program.find_uniform("albedo"),
            program,
        })
    }

    fn draw(
        &self,
        gpu: &Gpu,
        fbo: &FrameBufferObject,
        cube: &VertexArrayObject,
        texture: &Texture,
        t: f32,
        aspect: f32,
    ) {
        let model = Mat4::from_rotation_y(t * 0.7) * Mat4::from_rotation_x(t * 0.4);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 1.2, 3.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, 100.0);

        let target = fbo.target();
        gpu.clear(&target, wgpu::Color { r: 0.08, g: 0.09, b: 0.12, a: 1.0 }, Some(1.0));

        let mut binding = gpu.bind(&self.program);
        binding.set_uniform_mat4(self.model, model);
        binding.set_uniform_mat4(self.view_proj, proj * view);
        binding.set_uniform_vec3(self.light_dir, Vec3::new(-0.4, -1.0, -0.6));
        binding.bind_texture(self.albedo, texture);
        binding.draw(&target, cube);
    }
}

struct PostPass {
    program: ShaderProgram,
    scene: Option<UniformLocation>,
    vignette: Option<UniformLocation>,
}

impl PostPass {
    fn new(gpu: &Gpu, shader_dir: &Path) -> Result<Self> {
        let program = create_program(
            gpu,
            shader_dir.join("post.vs.wgsl"),
            shader_dir.join("post.fs.wgsl"),
        )
        .context("failed to load post shaders")?;
        anyhow::ensure!(
            program.is_usable(),
            "post program is unusable: {:?}",
            program.status()
        );

        Ok(Self {
            scene: program.find_uniform("scene"),
            vignette: program.find_uniform("vignette"),
            program,
        })
    }

    fn draw(
        &self,
        gpu: &Gpu,
        screen: &RenderTarget<'_>,
        quad: &VertexArrayObject,
        fbo: &FrameBufferObject,
    ) {
        gpu.clear(screen, wgpu::Color::BLACK, Some(1.0));

        let mut binding = gpu.bind(&self.program);
        binding.set_uniform_float(self.vignette, 0.9);
        binding.bind_texture(self.scene, fbo);
        binding.draw(screen, quad);
    }
}

fn albedo(gpu: &Gpu, assets: Option<&Path>) -> Result<Texture> {
    if let Some(path) = assets.map(|dir| dir.join("albedo.png")).filter(|p| p.is_file()) {
        return load_texture(gpu, &path).with_context(|| format!("loading {}", path.display()));
    }

    let checker = RgbaImage::from_fn(64, 64, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            image::Rgba([230, 120, 40, 255])
        } else {
            image::Rgba([40, 40, 48, 255])
        }
    });
    Ok(texture_from_rgba(gpu, checker))
}

fn cube_mesh(gpu: &Gpu) -> Result<VertexArrayObject> {
    // (normal, u axis, v axis) per face.
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    let corners = [
        Vec2::new(-1.0, -1.0),
        Vec2::new(1.0, -1.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(-1.0, 1.0),
    ];

    let mut positions = Vec::with_capacity(24 * 3);
    let mut texcoords = Vec::with_capacity(24 * 2);
    let mut normals = Vec::with_capacity(24 * 3);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in faces {
        let base = (positions.len() / 3) as u32;
        for c in corners {
            let p = (normal + u * c.x + v * c.y) * 0.5;
            positions.extend_from_slice(&p.to_array());
            texcoords.extend_from_slice(&((c + Vec2::ONE) * 0.5).to_array());
            normals.extend_from_slice(&normal.to_array());
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    load_vertex_array(
        gpu,
        Some(positions.as_slice()),
        Some(texcoords.as_slice()),
        Some(normals.as_slice()),
        24,
        &indices,
    )
    .context("failed to upload cube")
}

fn fullscreen_quad(gpu: &Gpu) -> Result<VertexArrayObject> {
    let positions: [f32; 12] = [-1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0, 1.0, 0.0, -1.0, 1.0, 0.0];
    let texcoords: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    load_vertex_array(
        gpu,
        Some(&positions[..]),
        Some(&texcoords[..]),
        None,
        4,
        &[0, 1, 2, 0, 2, 3],
    )
    .context("failed to upload fullscreen quad")
}
