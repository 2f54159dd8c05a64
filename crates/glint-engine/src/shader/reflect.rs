//! Resource and interface reflection over validated naga IR.

use std::collections::BTreeSet;

use naga::{AddressSpace, Binding, Handle, ImageDimension, Module, ShaderStage as NagaStage, TypeInner};

use super::stage::StageIr;

/// Byte range of a named struct member inside a uniform global.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct UniformMember {
    pub(crate) name: String,
    pub(crate) offset: u32,
    pub(crate) size: u32,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum SlotKind {
    Uniform { size: u32, members: Vec<UniformMember> },
    Storage { read_only: bool },
    Texture { cube: bool },
    Sampler,
}

/// One `@group(g) @binding(b)` resource a program declares.
#[derive(Debug, Clone)]
pub(crate) struct ResourceSlot {
    pub(crate) name: String,
    pub(crate) group: u32,
    pub(crate) binding: u32,
    pub(crate) kind: SlotKind,
    /// Referenced by at least one linked entry point. wgpu's automatic
    /// pipeline layout omits everything else.
    pub(crate) used: bool,
    /// Index of the `<name>_sampler` slot, for textures.
    pub(crate) sampler: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Reflection {
    pub(crate) slots: Vec<ResourceSlot>,
}

impl Reflection {
    /// Merges the resource globals of every `(ir, entry point index)` pair.
    ///
    /// Stages of one program share slots by `(group, binding)`.
    pub(crate) fn gather(stages: &[(&StageIr, usize)]) -> Self {
        let mut slots: Vec<ResourceSlot> = Vec::new();

        for &(ir, ep_index) in stages {
            let function_info = ir.info.get_entry_point(ep_index);

            for (handle, var) in ir.module.global_variables.iter() {
                let Some(binding) = var.binding.as_ref() else {
                    continue;
                };
                let Some(kind) = slot_kind(&ir.module, var.space, var.ty) else {
                    continue;
                };
                let used = !function_info[handle].is_empty();

                if let Some(existing) = slots
                    .iter_mut()
                    .find(|s| s.group == binding.group && s.binding == binding.binding)
                {
                    existing.used |= used;
                    continue;
                }

                slots.push(ResourceSlot {
                    name: global_name(&ir.module, handle),
                    group: binding.group,
                    binding: binding.binding,
                    kind,
                    used,
                    sampler: None,
                });
            }
        }

        let pairs: Vec<(usize, usize)> = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s.kind, SlotKind::Texture { .. }))
            .filter_map(|(ti, tex)| {
                let wanted = format!("{}_sampler", tex.name);
                slots
                    .iter()
                    .position(|s| s.kind == SlotKind::Sampler && s.name == wanted)
                    .map(|si| (ti, si))
            })
            .collect();
        for (ti, si) in pairs {
            slots[ti].sampler = Some(si);
        }

        Self { slots }
    }

    /// Resolves a uniform name to a slot and byte range.
    ///
    /// Accepted forms, in order: a global name, `global.member`, then a bare
    /// member name of any uniform block.
    pub(crate) fn find_uniform(&self, name: &str) -> Option<(usize, u32, u32)> {
        if let Some(index) = self.slots.iter().position(|s| s.name == name) {
            let slot = &self.slots[index];
            return match &slot.kind {
                SlotKind::Uniform { size, .. } => Some((index, 0, *size)),
                SlotKind::Texture { .. } | SlotKind::Sampler => Some((index, 0, 0)),
                SlotKind::Storage { .. } => None,
            };
        }

        if let Some((block, member)) = name.split_once('.') {
            return self
                .slots
                .iter()
                .position(|s| s.name == block)
                .and_then(|index| member_range(&self.slots[index], member).map(|(o, s)| (index, o, s)));
        }

        self.slots
            .iter()
            .enumerate()
            .find_map(|(index, slot)| member_range(slot, name).map(|(o, s)| (index, o, s)))
    }

    pub(crate) fn find_storage(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.name == name && matches!(s.kind, SlotKind::Storage { .. }))
    }

    /// Groups referenced by used slots, ascending.
    pub(crate) fn used_groups(&self) -> BTreeSet<u32> {
        self.slots.iter().filter(|s| s.used).map(|s| s.group).collect()
    }
}

fn member_range(slot: &ResourceSlot, member: &str) -> Option<(u32, u32)> {
    match &slot.kind {
        SlotKind::Uniform { members, .. } => members
            .iter()
            .find(|m| m.name == member)
            .map(|m| (m.offset, m.size)),
        _ => None,
    }
}

fn global_name(module: &Module, handle: Handle<naga::GlobalVariable>) -> String {
    let var = &module.global_variables[handle];
    var.name
        .clone()
        .or_else(|| module.types[var.ty].name.clone())
        .unwrap_or_default()
}

fn slot_kind(module: &Module, space: AddressSpace, ty: Handle<naga::Type>) -> Option<SlotKind> {
    let inner = &module.types[ty].inner;

    match space {
        AddressSpace::Uniform => {
            let members = match inner {
                TypeInner::Struct { members, .. } => members
                    .iter()
                    .filter_map(|m| {
                        Some(UniformMember {
                            name: m.name.clone()?,
                            offset: m.offset,
                            size: module.types[m.ty].inner.size(module.to_ctx()),
                        })
                    })
                    .collect(),
                _ => Vec::new(),
            };
            Some(SlotKind::Uniform {
                size: inner.size(module.to_ctx()),
                members,
            })
        }
        AddressSpace::Storage { access } => Some(SlotKind::Storage {
            read_only: !access.contains(naga::StorageAccess::STORE),
        }),
        AddressSpace::Handle => match inner {
            TypeInner::Image { dim, .. } => Some(SlotKind::Texture {
                cube: *dim == ImageDimension::Cube,
            }),
            TypeInner::Sampler { .. } => Some(SlotKind::Sampler),
            _ => None,
        },
        _ => None,
    }
}

/// Index of the first entry point for `stage`, with its name.
pub(crate) fn find_entry_point(module: &Module, stage: NagaStage) -> Option<(usize, String)> {
    module
        .entry_points
        .iter()
        .enumerate()
        .find(|(_, ep)| ep.stage == stage)
        .map(|(i, ep)| (i, ep.name.clone()))
}

/// `@location` numbers consumed by an entry point's arguments.
pub(crate) fn input_locations(module: &Module, ep_index: usize) -> BTreeSet<u32> {
    let function = &module.entry_points[ep_index].function;
    let mut out = BTreeSet::new();
    for arg in &function.arguments {
        collect_locations(module, arg.binding.as_ref(), arg.ty, &mut out);
    }
    out
}

/// `@location` numbers produced by an entry point's result.
pub(crate) fn output_locations(module: &Module, ep_index: usize) -> BTreeSet<u32> {
    let function = &module.entry_points[ep_index].function;
    let mut out = BTreeSet::new();
    if let Some(result) = &function.result {
        collect_locations(module, result.binding.as_ref(), result.ty, &mut out);
    }
    out
}

fn collect_locations(
    module: &Module,
    binding: Option<&Binding>,
    ty: Handle<naga::Type>,
    out: &mut BTreeSet<u32>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.insert(*location);
        }
        Some(_) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.binding.as_ref(), member.ty, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::stage::{CompiledStage, SourceLanguage};
    use crate::shader::ShaderStage;

    fn ir(src: &str, stage: ShaderStage) -> StageIr {
        let compiled = CompiledStage::from_source("test", src, SourceLanguage::Wgsl, stage);
        assert!(compiled.is_compiled(), "{:?}", compiled.log());
        compiled.into_ir().expect("compiled")
    }

    const VS: &str = r#"
struct Camera {
    view: mat4x4<f32>,
    eye: vec3<f32>,
    exposure: f32,
};

@group(0) @binding(0) var<uniform> camera: Camera;
@group(0) @binding(1) var<uniform> model: mat4x4<f32>;
@group(0) @binding(5) var<uniform> unused_tint: vec4<f32>;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) normal: vec3<f32>,
};

@vertex
fn vs_main(@location(0) pos: vec3<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.pos = camera.view * model * vec4<f32>(pos * camera.exposure, 1.0);
    out.uv = uv;
    out.normal = camera.eye;
    return out;
}
"#;

    const FS: &str = r#"
@group(1) @binding(0) var albedo: texture_2d<f32>;
@group(1) @binding(1) var albedo_sampler: sampler;
@group(2) @binding(0) var<storage, read> weights: array<f32>;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(albedo, albedo_sampler, uv) * weights[0];
}
"#;

    fn reflection() -> Reflection {
        let vs = ir(VS, ShaderStage::Vertex);
        let fs = ir(FS, ShaderStage::Fragment);
        Reflection::gather(&[(&vs, 0), (&fs, 0)])
    }

    // ── lookup ──────────────────────────────────────────────────────────

    #[test]
    fn whole_global_lookup_covers_its_size() {
        let r = reflection();
        let (slot, offset, size) = r.find_uniform("model").expect("model");
        assert_eq!(r.slots[slot].binding, 1);
        assert_eq!(offset, 0);
        assert_eq!(size, 64);
    }

    #[test]
    fn dotted_member_lookup_uses_struct_offset() {
        let r = reflection();
        let (slot, offset, size) = r.find_uniform("camera.eye").expect("camera.eye");
        assert_eq!(r.slots[slot].name, "camera");
        assert_eq!(offset, 64);
        assert_eq!(size, 12);

        let (_, offset, size) = r.find_uniform("camera.exposure").expect("exposure");
        assert_eq!(offset, 76);
        assert_eq!(size, 4);
    }

    #[test]
    fn bare_member_name_resolves() {
        let r = reflection();
        let (_, offset, _) = r.find_uniform("view").expect("view");
        assert_eq!(offset, 0);
    }

    #[test]
    fn miss_is_none() {
        let r = reflection();
        assert!(r.find_uniform("nope").is_none());
        assert!(r.find_uniform("camera.nope").is_none());
        assert!(r.find_uniform("weights").is_none());
        assert!(r.find_storage("camera").is_none());
    }

    #[test]
    fn storage_block_lookup() {
        let r = reflection();
        let idx = r.find_storage("weights").expect("weights");
        assert_eq!(r.slots[idx].kind, SlotKind::Storage { read_only: true });
        assert_eq!(r.slots[idx].group, 2);
    }

    // ── usage & pairing ─────────────────────────────────────────────────

    #[test]
    fn unreferenced_globals_are_marked_unused() {
        let r = reflection();
        let (slot, _, _) = r.find_uniform("unused_tint").expect("declared");
        assert!(!r.slots[slot].used);
        assert!(r.slots.iter().filter(|s| s.name != "unused_tint").all(|s| s.used));
        assert_eq!(r.used_groups().into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn texture_is_paired_with_its_sampler() {
        let r = reflection();
        let (tex, _, _) = r.find_uniform("albedo").expect("albedo");
        let sampler = r.slots[tex].sampler.expect("paired");
        assert_eq!(r.slots[sampler].name, "albedo_sampler");
        assert_eq!(r.slots[tex].kind, SlotKind::Texture { cube: false });
    }

    // ── interface ───────────────────────────────────────────────────────

    #[test]
    fn entry_point_interface_locations() {
        let vs = ir(VS, ShaderStage::Vertex);
        let fs = ir(FS, ShaderStage::Fragment);

        let (vi, name) = find_entry_point(&vs.module, NagaStage::Vertex).expect("vs");
        assert_eq!(name, "vs_main");
        assert_eq!(input_locations(&vs.module, vi).into_iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(output_locations(&vs.module, vi).into_iter().collect::<Vec<_>>(), vec![0, 1]);

        let (fi, _) = find_entry_point(&fs.module, NagaStage::Fragment).expect("fs");
        assert_eq!(input_locations(&fs.module, fi).into_iter().collect::<Vec<_>>(), vec![0]);
        assert!(find_entry_point(&fs.module, NagaStage::Vertex).is_none());
    }
}
