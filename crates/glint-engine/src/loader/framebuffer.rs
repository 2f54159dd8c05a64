use crate::device::Gpu;
use crate::render::{RenderTarget, Sampled};

use super::{readback, LoadError};

/// Color format of framebuffer attachments.
pub const FBO_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Formats and filters used when (re)creating framebuffer attachments.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct AttachmentSpec {
    pub(crate) depth_format: wgpu::TextureFormat,
    pub(crate) min_filter: wgpu::FilterMode,
    pub(crate) mag_filter: wgpu::FilterMode,
}

impl AttachmentSpec {
    /// Attachments made by [`load_framebuffer`]: depth-only, nearest filtering.
    pub(crate) const INITIAL: Self = Self {
        depth_format: wgpu::TextureFormat::Depth32Float,
        min_filter: wgpu::FilterMode::Nearest,
        mag_filter: wgpu::FilterMode::Nearest,
    };

    /// Attachments made by [`resize_framebuffer`]. Unlike the initial ones
    /// these carry a stencil aspect and minify linearly.
    pub(crate) const RESIZED: Self = Self {
        depth_format: wgpu::TextureFormat::Depth24PlusStencil8,
        min_filter: wgpu::FilterMode::Linear,
        mag_filter: wgpu::FilterMode::Nearest,
    };
}

/// Offscreen render target: an RGBA8 color texture plus a depth texture.
pub struct FrameBufferObject {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    spec: AttachmentSpec,
    width: u32,
    height: u32,
    generation: u32,
}

impl FrameBufferObject {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Depth attachment format. Differs between freshly loaded and resized
    /// framebuffers.
    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.spec.depth_format
    }

    /// Number of times the attachments have been recreated.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Color + depth attachments as a draw target.
    pub fn target(&self) -> RenderTarget<'_> {
        RenderTarget::new(
            &self.color_view,
            FBO_COLOR_FORMAT,
            Some((&self.depth_view, self.spec.depth_format)),
            (self.width, self.height),
        )
    }

    pub fn free(self) {
        self.color.destroy();
        self.depth.destroy();
        log::debug!("freed framebuffer {}x{}", self.width, self.height);
    }
}

/// Samples the color attachment.
impl Sampled for FrameBufferObject {
    fn view(&self) -> &wgpu::TextureView {
        &self.color_view
    }

    fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

/// Allocates a `width` x `height` framebuffer.
pub fn load_framebuffer(gpu: &Gpu, width: u32, height: u32) -> FrameBufferObject {
    let spec = AttachmentSpec::INITIAL;
    let attachments = Attachments::create(gpu, width, height, spec);
    log::debug!(
        "loaded framebuffer {width}x{height} (depth {:?})",
        spec.depth_format
    );

    FrameBufferObject {
        color: attachments.color,
        color_view: attachments.color_view,
        depth: attachments.depth,
        depth_view: attachments.depth_view,
        sampler: attachments.sampler,
        spec,
        width,
        height,
        generation: 0,
    }
}

/// Recreates the attachments at the new size.
///
/// A no-op returning `false` when the size is unchanged. Recreated
/// attachments use [`AttachmentSpec::RESIZED`], so the depth format changes
/// to a combined depth-stencil format after the first real resize.
pub fn resize_framebuffer(gpu: &Gpu, fbo: &mut FrameBufferObject, width: u32, height: u32) -> bool {
    if !needs_resize((fbo.width, fbo.height), (width, height)) {
        return false;
    }

    fbo.color.destroy();
    fbo.depth.destroy();

    let spec = AttachmentSpec::RESIZED;
    let attachments = Attachments::create(gpu, width, height, spec);
    fbo.color = attachments.color;
    fbo.color_view = attachments.color_view;
    fbo.depth = attachments.depth;
    fbo.depth_view = attachments.depth_view;
    fbo.sampler = attachments.sampler;

    if fbo.spec.depth_format != spec.depth_format {
        log::debug!(
            "framebuffer depth format changed on resize: {:?} -> {:?}",
            fbo.spec.depth_format,
            spec.depth_format
        );
    }
    log::debug!(
        "resized framebuffer {}x{} -> {width}x{height}",
        fbo.width,
        fbo.height
    );

    fbo.spec = spec;
    fbo.width = width;
    fbo.height = height;
    fbo.generation += 1;
    true
}

/// Copies the color attachment to the host as RGBA8 rows, top row first.
///
/// Slow: waits for the GPU to go idle.
pub fn read_framebuffer(gpu: &Gpu, fbo: &FrameBufferObject) -> Result<Vec<u8>, LoadError> {
    readback::read_texture_rgba8(gpu, &fbo.color, fbo.width.max(1), fbo.height.max(1))
}

pub(crate) fn needs_resize(current: (u32, u32), requested: (u32, u32)) -> bool {
    current != requested
}

struct Attachments {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl Attachments {
    fn create(gpu: &Gpu, width: u32, height: u32, spec: AttachmentSpec) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };

        let color = gpu.create_texture(&wgpu::TextureDescriptor {
            label: Some("glint fbo color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FBO_COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = gpu.create_texture(&wgpu::TextureDescriptor {
            label: Some("glint fbo depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: spec.depth_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let sampler = gpu.device().create_sampler(&wgpu::SamplerDescriptor {
            label: Some("glint fbo sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: spec.mag_filter,
            min_filter: spec.min_filter,
            ..Default::default()
        });

        Self {
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
            depth,
            sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_size_does_not_resize() {
        assert!(!needs_resize((256, 256), (256, 256)));
        assert!(needs_resize((256, 256), (512, 256)));
        assert!(needs_resize((256, 256), (256, 255)));
    }

    #[test]
    fn resize_switches_to_depth_stencil() {
        assert!(!AttachmentSpec::INITIAL.depth_format.has_stencil_aspect());
        assert!(AttachmentSpec::RESIZED.depth_format.has_stencil_aspect());
        assert_eq!(AttachmentSpec::INITIAL.min_filter, wgpu::FilterMode::Nearest);
        assert_eq!(AttachmentSpec::RESIZED.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(AttachmentSpec::RESIZED.mag_filter, wgpu::FilterMode::Nearest);
    }
}
