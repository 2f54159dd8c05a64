/// Attachments a draw renders into.
///
/// Obtained from [`crate::Gpu::screen_target`] or
/// [`crate::loader::FrameBufferObject::target`].
#[derive(Clone, Copy)]
pub struct RenderTarget<'a> {
    pub(crate) color: &'a wgpu::TextureView,
    pub(crate) color_format: wgpu::TextureFormat,
    pub(crate) depth: Option<(&'a wgpu::TextureView, wgpu::TextureFormat)>,
    pub(crate) size: (u32, u32),
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(
        color: &'a wgpu::TextureView,
        color_format: wgpu::TextureFormat,
        depth: Option<(&'a wgpu::TextureView, wgpu::TextureFormat)>,
        size: (u32, u32),
    ) -> Self {
        Self {
            color,
            color_format,
            depth,
            size,
        }
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    pub fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        self.depth.map(|(_, format)| format)
    }

    /// Size in physical pixels as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub(crate) fn color_attachment(
        &self,
        load: wgpu::LoadOp<wgpu::Color>,
    ) -> wgpu::RenderPassColorAttachment<'a> {
        wgpu::RenderPassColorAttachment {
            view: self.color,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        }
    }

    /// Depth (and stencil, for combined formats) attachment.
    ///
    /// `clear = Some(depth)` clears depth to that value and stencil to zero;
    /// `None` loads both.
    pub(crate) fn depth_attachment(
        &self,
        clear: Option<f32>,
    ) -> Option<wgpu::RenderPassDepthStencilAttachment<'a>> {
        let (view, format) = self.depth?;

        let (depth_load, stencil_load) = match clear {
            Some(depth) => (wgpu::LoadOp::Clear(depth), wgpu::LoadOp::Clear(0)),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };
        let stencil_ops = format.has_stencil_aspect().then_some(wgpu::Operations {
            load: stencil_load,
            store: wgpu::StoreOp::Store,
        });

        Some(wgpu::RenderPassDepthStencilAttachment {
            view,
            depth_ops: Some(wgpu::Operations {
                load: depth_load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops,
        })
    }
}
