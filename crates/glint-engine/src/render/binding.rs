use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec3};

use crate::device::Gpu;
use crate::loader::{ShaderStorageBuffer, VertexArrayObject};
use crate::shader::{ShaderProgram, StorageBlockIndex, UniformLocation};

use super::RenderTarget;

/// Something that can be bound to a texture slot: a view plus the sampler
/// used with it.
pub trait Sampled {
    fn view(&self) -> &wgpu::TextureView;
    fn sampler(&self) -> &wgpu::Sampler;
}

#[derive(Clone, Copy)]
enum Bound<'a> {
    Storage(&'a wgpu::Buffer),
    Texture {
        view: &'a wgpu::TextureView,
        sampler: &'a wgpu::Sampler,
    },
}

/// A program made current for uniform writes, resource binding and
/// draw/dispatch calls.
///
/// Uniform setters write straight into the program's uniform buffers; the
/// values persist on the program across bindings. Storage blocks and
/// textures are bound per binding.
pub struct ProgramBinding<'a> {
    gpu: &'a Gpu,
    program: &'a ShaderProgram,
    resources: HashMap<usize, Bound<'a>>,
}

impl Gpu {
    /// Makes `program` current.
    pub fn bind<'a>(&'a self, program: &'a ShaderProgram) -> ProgramBinding<'a> {
        if !program.is_usable() {
            log::warn!(
                "binding unusable program {} ({:?})",
                program.label(),
                program.status()
            );
        }
        ProgramBinding {
            gpu: self,
            program,
            resources: HashMap::new(),
        }
    }
}

impl<'a> ProgramBinding<'a> {
    pub fn program(&self) -> &'a ShaderProgram {
        self.program
    }

    // ── uniforms ──────────────────────────────────────────────────────────

    pub fn set_uniform_mat4(&self, location: Option<UniformLocation>, value: Mat4) {
        self.write_uniform(location, bytemuck::cast_slice(&value.to_cols_array()));
    }

    pub fn set_uniform_vec3(&self, location: Option<UniformLocation>, value: Vec3) {
        self.write_uniform(location, bytemuck::cast_slice(&value.to_array()));
    }

    pub fn set_uniform_vec2(&self, location: Option<UniformLocation>, value: Vec2) {
        self.write_uniform(location, bytemuck::cast_slice(&value.to_array()));
    }

    pub fn set_uniform_float(&self, location: Option<UniformLocation>, value: f32) {
        self.write_uniform(location, bytemuck::bytes_of(&value));
    }

    pub fn set_uniform_int(&self, location: Option<UniformLocation>, value: i32) {
        self.write_uniform(location, bytemuck::bytes_of(&value));
    }

    /// `None` locations are ignored, like writes to location -1.
    fn write_uniform(&self, location: Option<UniformLocation>, bytes: &[u8]) {
        let Some(location) = location else { return };
        let Some(linked) = self.program.linked.as_ref() else {
            return;
        };
        let Some(Some(buffer)) = linked.uniform_buffers.get(location.slot) else {
            log::warn!(
                "uniform write to a non-uniform slot in program {}",
                self.program.label()
            );
            return;
        };

        let len = (bytes.len() as u64).min(location.size);
        if len != bytes.len() as u64 {
            log::warn!(
                "uniform write of {} bytes truncated to {} in program {}",
                bytes.len(),
                location.size,
                self.program.label()
            );
        }
        if len == 0 {
            return;
        }
        self.gpu
            .queue()
            .write_buffer(buffer, location.offset, &bytes[..len as usize]);
    }

    // ── resources ─────────────────────────────────────────────────────────

    /// Binds `buffer` to a storage block for subsequent draws/dispatches.
    pub fn bind_storage_block(
        &mut self,
        index: Option<StorageBlockIndex>,
        buffer: &'a ShaderStorageBuffer,
    ) {
        if let Some(StorageBlockIndex(slot)) = index {
            self.resources.insert(slot, Bound::Storage(buffer.buffer()));
        }
    }

    /// Binds a texture (and its sampler, to the paired `<name>_sampler` slot).
    pub fn bind_texture<T: Sampled>(&mut self, location: Option<UniformLocation>, texture: &'a T) {
        if let Some(location) = location {
            self.resources.insert(
                location.slot,
                Bound::Texture {
                    view: texture.view(),
                    sampler: texture.sampler(),
                },
            );
        }
    }

    // ── commands ──────────────────────────────────────────────────────────

    /// Indexed draw of `vao` into `target`.
    ///
    /// Skipped with a warning when the program is unusable or is missing a
    /// vertex input or resource.
    pub fn draw(&self, target: &RenderTarget<'_>, vao: &VertexArrayObject) {
        let Some(linked) = self.program.linked.as_ref() else {
            log::warn!("draw skipped: program {} is not linked", self.program.label());
            return;
        };
        let Some(inputs) = linked.vertex_inputs() else {
            log::warn!(
                "draw skipped: program {} is a compute program",
                self.program.label()
            );
            return;
        };
        if let Some(missing) = inputs.iter().find(|&&l| !vao.layout().provides(l)) {
            log::warn!(
                "draw skipped: vertex array has no attribute for @location({missing})"
            );
            return;
        }
        if vao.vertex_count() == 0 {
            return;
        }

        let Some(pipeline) = linked.render_pipeline(
            self.gpu,
            vao.layout(),
            target.color_format(),
            target.depth_format(),
        ) else {
            return;
        };
        let Some(bind_groups) = self.bind_groups(|g| pipeline.get_bind_group_layout(g)) else {
            return;
        };

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glint draw encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("glint draw pass"),
                color_attachments: &[Some(target.color_attachment(wgpu::LoadOp::Load))],
                depth_stencil_attachment: target.depth_attachment(None),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(&pipeline);
            for (group, bind_group) in bind_groups.iter().enumerate() {
                rpass.set_bind_group(group as u32, bind_group, &[]);
            }
            if !vao.layout().attributes.is_empty() {
                rpass.set_vertex_buffer(0, vao.vertex_buffer().slice(..));
            }
            rpass.set_index_buffer(vao.index_buffer().slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..vao.vertex_count(), 0, 0..1);
        }
        self.gpu.queue().submit(std::iter::once(encoder.finish()));
    }

    /// Dispatches a compute program over `x * y * z` workgroups.
    pub fn dispatch(&self, x: u32, y: u32, z: u32) {
        let Some(linked) = self.program.linked.as_ref() else {
            log::warn!("dispatch skipped: program {} is not linked", self.program.label());
            return;
        };
        let Some(pipeline) = linked.compute_pipeline(self.gpu) else {
            log::warn!(
                "dispatch skipped: program {} is not a compute program",
                self.program.label()
            );
            return;
        };
        let Some(bind_groups) = self.bind_groups(|g| pipeline.get_bind_group_layout(g)) else {
            return;
        };

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glint dispatch encoder"),
            });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("glint dispatch pass"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&pipeline);
            for (group, bind_group) in bind_groups.iter().enumerate() {
                cpass.set_bind_group(group as u32, bind_group, &[]);
            }
            cpass.dispatch_workgroups(x, y, z);
        }
        self.gpu.queue().submit(std::iter::once(encoder.finish()));
    }

    /// One bind group per group index up to the highest used one. Gaps get
    /// empty groups, matching the pipeline's derived layout.
    fn bind_groups(
        &self,
        layout_for: impl Fn(u32) -> wgpu::BindGroupLayout,
    ) -> Option<Vec<wgpu::BindGroup>> {
        let linked = self.program.linked.as_ref()?;
        let reflection = &linked.reflection;
        let Some(&last) = reflection.used_groups().last() else {
            return Some(Vec::new());
        };

        let mut groups = Vec::with_capacity(last as usize + 1);
        for group in 0..=last {
            let mut entries = Vec::new();

            for (index, slot) in reflection.slots.iter().enumerate() {
                if !slot.used || slot.group != group {
                    continue;
                }
                let Some(resource) = self.resource_for(index) else {
                    log::warn!(
                        "skipped: {} (@group({}) @binding({})) is not bound in program {}",
                        slot.name,
                        slot.group,
                        slot.binding,
                        self.program.label()
                    );
                    return None;
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: slot.binding,
                    resource,
                });
            }

            groups.push(self.gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("glint bind group"),
                layout: &layout_for(group),
                entries: &entries,
            }));
        }
        Some(groups)
    }

    fn resource_for(&self, index: usize) -> Option<wgpu::BindingResource<'a>> {
        let linked = self.program.linked.as_ref()?;

        if let Some(Some(buffer)) = linked.uniform_buffers.get(index) {
            return Some(buffer.as_entire_binding());
        }
        match self.resources.get(&index).copied() {
            Some(Bound::Storage(buffer)) => return Some(buffer.as_entire_binding()),
            Some(Bound::Texture { view, .. }) => {
                return Some(wgpu::BindingResource::TextureView(view));
            }
            None => {}
        }

        // A sampler slot takes the sampler of the texture paired with it.
        linked
            .reflection
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.sampler == Some(index))
            .find_map(
                |(texture_index, _)| match self.resources.get(&texture_index).copied() {
                    Some(Bound::Texture { sampler, .. }) => {
                        Some(wgpu::BindingResource::Sampler(sampler))
                    }
                    _ => None,
                },
            )
    }
}
