use crate::device::Gpu;

use super::RenderTarget;

impl Gpu {
    /// Clears `target` to `color`, and its depth buffer to `depth` when given.
    pub fn clear(&self, target: &RenderTarget<'_>, color: wgpu::Color, depth: Option<f32>) {
        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glint clear encoder"),
            });
        {
            let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("glint clear pass"),
                color_attachments: &[Some(target.color_attachment(wgpu::LoadOp::Clear(color)))],
                depth_stencil_attachment: target.depth_attachment(depth),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        self.queue().submit(std::iter::once(encoder.finish()));
    }
}
