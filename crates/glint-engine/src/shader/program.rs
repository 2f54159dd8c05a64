use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::rc::Rc;

use crate::device::Gpu;
use crate::loader::VertexLayout;

use super::reflect::{self, Reflection, SlotKind};
use super::stage::{compile, CompiledStage, StageIr};
use super::{ShaderError, ShaderStage};

/// Outcome of compiling and linking a program.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProgramStatus {
    Linked,
    /// Every stage that failed to compile, with their diagnostics joined.
    CompileFailed {
        stages: Vec<ShaderStage>,
        log: String,
    },
    LinkFailed { log: String },
}

/// Where a named uniform lives: a reflected slot plus a byte range inside its
/// uniform buffer. Texture and sampler slots resolve with an empty range.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformLocation {
    pub(crate) slot: usize,
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

impl UniformLocation {
    /// Size in bytes of the value at this location.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Index of a storage block (`var<storage>` global) in a program.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct StorageBlockIndex(pub(crate) usize);

pub(crate) struct Entry {
    module: wgpu::ShaderModule,
    name: String,
}

pub(crate) enum Stages {
    Graphics {
        vertex: Entry,
        fragment: Entry,
        vertex_inputs: BTreeSet<u32>,
    },
    Compute(Entry),
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct PipelineKey {
    layout: VertexLayout,
    color: wgpu::TextureFormat,
    depth: Option<wgpu::TextureFormat>,
}

/// GPU half of a successfully linked program.
pub(crate) struct Linked {
    pub(crate) stages: Stages,
    pub(crate) reflection: Reflection,
    /// One buffer per uniform slot, indexed like `reflection.slots`.
    pub(crate) uniform_buffers: Vec<Option<wgpu::Buffer>>,

    render_pipelines: RefCell<HashMap<PipelineKey, Rc<wgpu::RenderPipeline>>>,
    compute_pipeline: RefCell<Option<Rc<wgpu::ComputePipeline>>>,
}

/// A compiled (and, when [`ProgramStatus::Linked`], usable) GPU program.
///
/// Always produced when the source files were readable; check
/// [`ShaderProgram::status`] to see whether it can draw.
pub struct ShaderProgram {
    label: String,
    status: ProgramStatus,
    pub(crate) linked: Option<Linked>,
}

/// Reads, compiles and links a vertex + fragment program.
pub fn create_program(
    gpu: &Gpu,
    vertex_path: impl AsRef<Path>,
    fragment_path: impl AsRef<Path>,
) -> Result<ShaderProgram, ShaderError> {
    let vertex = compile(vertex_path, ShaderStage::Vertex)?;
    let fragment = compile(fragment_path, ShaderStage::Fragment)?;
    Ok(ShaderProgram::link(gpu, vertex, fragment))
}

/// Reads, compiles and links a compute program.
pub fn create_compute_program(
    gpu: &Gpu,
    path: impl AsRef<Path>,
) -> Result<ShaderProgram, ShaderError> {
    let compute = compile(path, ShaderStage::Compute)?;
    Ok(ShaderProgram::link_compute(gpu, compute))
}

impl ShaderProgram {
    /// Links a vertex and a fragment stage.
    ///
    /// Linking is attempted even when a stage failed to compile; the failure
    /// is logged and recorded in the status.
    pub fn link(gpu: &Gpu, vertex: CompiledStage, fragment: CompiledStage) -> Self {
        let label = format!("{} + {}", vertex.label(), fragment.label());

        match check_graphics(vertex, fragment) {
            Ok((interface, vs, fs)) => {
                let reflection = Reflection::gather(&[
                    (&vs, interface.vertex_ep),
                    (&fs, interface.fragment_ep),
                ]);
                let stages = Stages::Graphics {
                    vertex: Entry {
                        module: create_module(gpu, &label, vs),
                        name: interface.vertex_name,
                    },
                    fragment: Entry {
                        module: create_module(gpu, &label, fs),
                        name: interface.fragment_name,
                    },
                    vertex_inputs: interface.vertex_inputs,
                };
                Self::linked(gpu, label, stages, reflection)
            }
            Err(status) => Self::failed(label, status),
        }
    }

    /// Links a single compute stage.
    pub fn link_compute(gpu: &Gpu, compute: CompiledStage) -> Self {
        let label = compute.label().to_owned();

        match check_compute(compute) {
            Ok((ep, name, cs)) => {
                let reflection = Reflection::gather(&[(&cs, ep)]);
                let stages = Stages::Compute(Entry {
                    module: create_module(gpu, &label, cs),
                    name,
                });
                Self::linked(gpu, label, stages, reflection)
            }
            Err(status) => Self::failed(label, status),
        }
    }

    fn linked(gpu: &Gpu, label: String, stages: Stages, reflection: Reflection) -> Self {
        let uniform_buffers = reflection
            .slots
            .iter()
            .map(|slot| match slot.kind {
                SlotKind::Uniform { size, .. } => Some(gpu.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("glint uniform {}", slot.name)),
                    size: uniform_buffer_size(size),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })),
                _ => None,
            })
            .collect();

        log::debug!(
            "linked program {label} ({} resource slots)",
            reflection.slots.len()
        );

        Self {
            label,
            status: ProgramStatus::Linked,
            linked: Some(Linked {
                stages,
                reflection,
                uniform_buffers,
                render_pipelines: RefCell::new(HashMap::new()),
                compute_pipeline: RefCell::new(None),
            }),
        }
    }

    fn failed(label: String, status: ProgramStatus) -> Self {
        match &status {
            ProgramStatus::CompileFailed { stages, .. } => {
                let names: Vec<String> = stages.iter().map(|s| s.to_string()).collect();
                log::error!(
                    "program link failed ({label}): {} stage did not compile",
                    names.join(" and ")
                );
            }
            ProgramStatus::LinkFailed { log } => {
                log::error!("program link failed ({label}):\n{log}");
            }
            ProgramStatus::Linked => {}
        }
        Self {
            label,
            status,
            linked: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn status(&self) -> &ProgramStatus {
        &self.status
    }

    /// Whether the program linked and can be drawn or dispatched with.
    pub fn is_usable(&self) -> bool {
        self.linked.is_some()
    }

    pub fn is_compute(&self) -> bool {
        matches!(
            self.linked.as_ref().map(|l| &l.stages),
            Some(Stages::Compute(_))
        )
    }

    /// Looks up a uniform by name. A miss (or an unlinked program) is `None`.
    pub fn find_uniform(&self, name: &str) -> Option<UniformLocation> {
        let (slot, offset, size) = self.linked.as_ref()?.reflection.find_uniform(name)?;
        Some(UniformLocation {
            slot,
            offset: offset as u64,
            size: size as u64,
        })
    }

    /// Looks up a storage block by its global name.
    pub fn find_storage_block(&self, name: &str) -> Option<StorageBlockIndex> {
        self.linked
            .as_ref()?
            .reflection
            .find_storage(name)
            .map(StorageBlockIndex)
    }

    /// Releases the program's uniform buffers and cached pipelines.
    pub fn free(self) {
        if let Some(linked) = self.linked {
            for buffer in linked.uniform_buffers.iter().flatten() {
                buffer.destroy();
            }
        }
        log::debug!("freed program {}", self.label);
    }
}

impl Linked {
    /// Vertex `@location`s the program consumes, for graphics programs.
    pub(crate) fn vertex_inputs(&self) -> Option<&BTreeSet<u32>> {
        match &self.stages {
            Stages::Graphics { vertex_inputs, .. } => Some(vertex_inputs),
            Stages::Compute(_) => None,
        }
    }

    /// Render pipeline for this vertex layout and attachment set, built on
    /// first use.
    pub(crate) fn render_pipeline(
        &self,
        gpu: &Gpu,
        layout: &VertexLayout,
        color: wgpu::TextureFormat,
        depth: Option<wgpu::TextureFormat>,
    ) -> Option<Rc<wgpu::RenderPipeline>> {
        let Stages::Graphics {
            vertex, fragment, ..
        } = &self.stages
        else {
            return None;
        };

        let key = PipelineKey {
            layout: layout.clone(),
            color,
            depth,
        };
        if let Some(pipeline) = self.render_pipelines.borrow().get(&key) {
            return Some(Rc::clone(pipeline));
        }

        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = if layout.attributes.is_empty() {
            Vec::new()
        } else {
            vec![layout.buffer_layout()]
        };
        let pipeline = gpu
            .device()
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("glint render pipeline"),
                layout: None,

                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: Some(vertex.name.as_str()),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },

                fragment: Some(wgpu::FragmentState {
                    module: &fragment.module,
                    entry_point: Some(fragment.name.as_str()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },

                depth_stencil: depth.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        log::debug!(
            "built render pipeline for {} (stride {}, {:?}, depth {:?})",
            self.label_hint(),
            layout.stride,
            color,
            depth
        );

        let pipeline = Rc::new(pipeline);
        self.render_pipelines
            .borrow_mut()
            .insert(key, Rc::clone(&pipeline));
        Some(pipeline)
    }

    pub(crate) fn compute_pipeline(&self, gpu: &Gpu) -> Option<Rc<wgpu::ComputePipeline>> {
        let Stages::Compute(entry) = &self.stages else {
            return None;
        };
        if let Some(pipeline) = self.compute_pipeline.borrow().as_ref() {
            return Some(Rc::clone(pipeline));
        }

        let pipeline = Rc::new(gpu.device().create_compute_pipeline(
            &wgpu::ComputePipelineDescriptor {
                label: Some("glint compute pipeline"),
                layout: None,
                module: &entry.module,
                entry_point: Some(entry.name.as_str()),
                compilation_options: Default::default(),
                cache: None,
            },
        ));
        *self.compute_pipeline.borrow_mut() = Some(Rc::clone(&pipeline));
        Some(pipeline)
    }

    fn label_hint(&self) -> &str {
        match &self.stages {
            Stages::Graphics { vertex, .. } => &vertex.name,
            Stages::Compute(entry) => &entry.name,
        }
    }
}

/// Uniform buffers are at least 16 bytes and a multiple of 16.
fn uniform_buffer_size(size: u32) -> u64 {
    (size.max(1) as u64).div_ceil(16) * 16
}

fn create_module(gpu: &Gpu, label: &str, ir: StageIr) -> wgpu::ShaderModule {
    gpu.device()
        .create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Naga(Cow::Owned(ir.module)),
        })
}

// ── link checks ─────────────────────────────────────────────────────────

struct GraphicsInterface {
    vertex_ep: usize,
    vertex_name: String,
    fragment_ep: usize,
    fragment_name: String,
    vertex_inputs: BTreeSet<u32>,
}

struct StageFailure {
    stage: ShaderStage,
    log: String,
}

fn stage_ir(stage: CompiledStage) -> Result<(String, StageIr), StageFailure> {
    let failed = StageFailure {
        stage: stage.stage(),
        log: stage.log().unwrap_or_default().to_owned(),
    };
    let label = stage.label().to_owned();
    stage.into_ir().map(|ir| (label, ir)).ok_or(failed)
}

fn compile_failed(failures: impl IntoIterator<Item = StageFailure>) -> ProgramStatus {
    let mut stages = Vec::new();
    let mut logs = Vec::new();
    for failure in failures {
        logs.push(format!("{} stage:\n{}", failure.stage, failure.log));
        stages.push(failure.stage);
    }
    ProgramStatus::CompileFailed {
        stages,
        log: logs.join("\n"),
    }
}

/// Checks both stages compiled, have entry points, and agree on the
/// vertex-to-fragment interface.
fn check_graphics(
    vertex: CompiledStage,
    fragment: CompiledStage,
) -> Result<(GraphicsInterface, StageIr, StageIr), ProgramStatus> {
    // Both stages are checked so every compile failure is reported.
    let (vertex, fragment) = (stage_ir(vertex), stage_ir(fragment));
    let ((vertex_label, vs), (fragment_label, fs)) = match (vertex, fragment) {
        (Ok(vertex), Ok(fragment)) => (vertex, fragment),
        (vertex, fragment) => {
            let failures = vertex.err().into_iter().chain(fragment.err());
            return Err(compile_failed(failures));
        }
    };

    let (vertex_ep, vertex_name) = reflect::find_entry_point(&vs.module, naga::ShaderStage::Vertex)
        .ok_or_else(|| ProgramStatus::LinkFailed {
            log: format!("{vertex_label}: no vertex entry point"),
        })?;
    let (fragment_ep, fragment_name) =
        reflect::find_entry_point(&fs.module, naga::ShaderStage::Fragment).ok_or_else(|| {
            ProgramStatus::LinkFailed {
                log: format!("{fragment_label}: no fragment entry point"),
            }
        })?;

    let produced = reflect::output_locations(&vs.module, vertex_ep);
    let consumed = reflect::input_locations(&fs.module, fragment_ep);
    let missing: Vec<u32> = consumed.difference(&produced).copied().collect();
    if !missing.is_empty() {
        return Err(ProgramStatus::LinkFailed {
            log: format!(
                "fragment input locations {missing:?} are not written by the vertex stage"
            ),
        });
    }

    let interface = GraphicsInterface {
        vertex_inputs: reflect::input_locations(&vs.module, vertex_ep),
        vertex_ep,
        vertex_name,
        fragment_ep,
        fragment_name,
    };
    Ok((interface, vs, fs))
}

fn check_compute(compute: CompiledStage) -> Result<(usize, String, StageIr), ProgramStatus> {
    let (label, cs) = stage_ir(compute).map_err(|f| compile_failed([f]))?;
    let (ep, name) = reflect::find_entry_point(&cs.module, naga::ShaderStage::Compute)
        .ok_or_else(|| ProgramStatus::LinkFailed {
            log: format!("{label}: no compute entry point"),
        })?;
    Ok((ep, name, cs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::SourceLanguage;

    const VS: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) pos: vec3<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.pos = vec4<f32>(pos, 1.0);
    out.uv = uv;
    return out;
}
"#;

    const FS: &str = r#"
@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, 0.0, 1.0);
}
"#;

    fn stage(src: &str, stage: ShaderStage) -> CompiledStage {
        CompiledStage::from_source(format!("{stage}"), src, SourceLanguage::Wgsl, stage)
    }

    // ── link checks ─────────────────────────────────────────────────────

    #[test]
    fn matching_interface_links() {
        let vs = stage(VS, ShaderStage::Vertex);
        let fs = stage(FS, ShaderStage::Fragment);
        let (interface, _, _) = check_graphics(vs, fs).ok().expect("links");
        assert_eq!(interface.vertex_name, "vs_main");
        assert_eq!(interface.fragment_name, "fs_main");
        assert_eq!(interface.vertex_inputs.into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn invalid_fragment_reports_compile_failure() {
        let vs = stage(VS, ShaderStage::Vertex);
        let fs = stage("@fragment fn fs_main() -> { nope }", ShaderStage::Fragment);
        let Err(status) = check_graphics(vs, fs) else {
            panic!("broken fragment must not link");
        };
        match status {
            ProgramStatus::CompileFailed { stages, log } => {
                assert_eq!(stages, vec![ShaderStage::Fragment]);
                assert!(log.starts_with("fragment stage:"));
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn both_broken_stages_are_reported() {
        let vs = stage("@vertex fn vs_main( { }", ShaderStage::Vertex);
        let fs = stage("@fragment fn fs_main() -> { nope }", ShaderStage::Fragment);
        let Err(ProgramStatus::CompileFailed { stages, log }) = check_graphics(vs, fs) else {
            panic!("broken stages must not link");
        };
        assert_eq!(stages, vec![ShaderStage::Vertex, ShaderStage::Fragment]);
        assert!(log.contains("vertex stage:"));
        assert!(log.contains("fragment stage:"));
    }

    #[test]
    fn unwritten_fragment_input_fails_link() {
        let vs = stage(VS, ShaderStage::Vertex);
        let fs = stage(
            r#"
@fragment
fn fs_main(@location(3) n: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(n, 1.0);
}
"#,
            ShaderStage::Fragment,
        );
        assert!(matches!(
            check_graphics(vs, fs),
            Err(ProgramStatus::LinkFailed { .. })
        ));
    }

    #[test]
    fn swapped_stages_fail_entry_point_check() {
        let vs = stage(FS, ShaderStage::Vertex);
        let fs = stage(FS, ShaderStage::Fragment);
        assert!(matches!(
            check_graphics(vs, fs),
            Err(ProgramStatus::LinkFailed { .. })
        ));
    }

    #[test]
    fn compute_entry_point_is_found() {
        let cs = stage(
            r#"
@group(0) @binding(0) var<storage, read_write> data: array<u32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    data[id.x] = data[id.x] * 2u;
}
"#,
            ShaderStage::Compute,
        );
        let (_, name, _) = check_compute(cs).ok().expect("compute links");
        assert_eq!(name, "main");
    }

    // ── sizing ──────────────────────────────────────────────────────────

    #[test]
    fn uniform_buffers_round_up_to_16() {
        assert_eq!(uniform_buffer_size(4), 16);
        assert_eq!(uniform_buffer_size(16), 16);
        assert_eq!(uniform_buffer_size(64), 64);
        assert_eq!(uniform_buffer_size(76), 80);
        assert_eq!(uniform_buffer_size(0), 16);
    }
}
