use crate::device::Gpu;

use super::LoadError;

/// Attribute slot of vertex positions (`@location(0)`, 3 floats).
pub const POSITION_SLOT: u32 = 0;
/// Attribute slot of texture coordinates (`@location(1)`, 2 floats).
pub const TEXCOORD_SLOT: u32 = 1;
/// Attribute slot of normals (`@location(2)`, 3 floats).
pub const NORMAL_SLOT: u32 = 2;

const SLOTS: [(u32, usize, wgpu::VertexFormat, &str); 3] = [
    (POSITION_SLOT, 3, wgpu::VertexFormat::Float32x3, "positions"),
    (TEXCOORD_SLOT, 2, wgpu::VertexFormat::Float32x2, "texcoords"),
    (NORMAL_SLOT, 3, wgpu::VertexFormat::Float32x3, "normals"),
];

/// Interleaved layout of a vertex buffer: only the attributes that were
/// supplied get a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexLayout {
    pub fn buffer_layout(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attributes,
        }
    }

    /// Whether `location` has an attribute in this layout.
    pub fn provides(&self, location: u32) -> bool {
        self.attributes.iter().any(|a| a.shader_location == location)
    }
}

/// Indexed geometry: one interleaved vertex buffer plus a `u32` index buffer.
pub struct VertexArrayObject {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    vertex_count: u32,
    layout: VertexLayout,
}

impl VertexArrayObject {
    /// Number of indices drawn. Draws are always indexed.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub(crate) fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub(crate) fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    pub fn free(self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        log::debug!("freed vertex array ({} indices)", self.vertex_count);
    }
}

/// Packs the supplied attributes into one interleaved buffer and uploads it
/// with `indices`.
///
/// Each present attribute slice must hold at least `vertex_count` vertices'
/// worth of floats; extra trailing floats are ignored.
pub fn load_vertex_array(
    gpu: &Gpu,
    positions: Option<&[f32]>,
    texcoords: Option<&[f32]>,
    normals: Option<&[f32]>,
    vertex_count: usize,
    indices: &[u32],
) -> Result<VertexArrayObject, LoadError> {
    let (layout, data) = interleave([positions, texcoords, normals], vertex_count)?;

    let vertex_buffer = gpu.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("glint vertices"),
        contents: bytemuck::cast_slice(&data),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = gpu.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("glint indices"),
        contents: bytemuck::cast_slice(indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    log::debug!(
        "loaded vertex array: {vertex_count} vertices, {} indices, stride {}",
        indices.len(),
        layout.stride
    );

    Ok(VertexArrayObject {
        vertex_buffer,
        index_buffer,
        vertex_count: indices.len() as u32,
        layout,
    })
}

/// Computes the layout for the present attributes and interleaves them.
pub(crate) fn interleave(
    attributes: [Option<&[f32]>; 3],
    vertex_count: usize,
) -> Result<(VertexLayout, Vec<f32>), LoadError> {
    let mut present: Vec<(&[f32], usize)> = Vec::new();
    let mut layout = VertexLayout {
        stride: 0,
        attributes: Vec::new(),
    };

    for (data, (slot, components, format, name)) in attributes.into_iter().zip(SLOTS) {
        let Some(data) = data else { continue };

        let expected = vertex_count * components;
        if data.len() < expected {
            return Err(LoadError::AttributeLength {
                attribute: name,
                expected,
                actual: data.len(),
                vertex_count,
            });
        }

        layout.attributes.push(wgpu::VertexAttribute {
            format,
            offset: layout.stride,
            shader_location: slot,
        });
        layout.stride += (components * size_of::<f32>()) as u64;
        present.push((data, components));
    }

    let floats_per_vertex: usize = present.iter().map(|(_, c)| c).sum();
    let mut out = Vec::with_capacity(vertex_count * floats_per_vertex);
    for v in 0..vertex_count {
        for (data, components) in &present {
            out.extend_from_slice(&data[v * components..(v + 1) * components]);
        }
    }

    Ok((layout, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    const POS: &[f32] = &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    const UV: &[f32] = &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
    const NRM: &[f32] = &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0];

    fn locations(layout: &VertexLayout) -> Vec<u32> {
        layout.attributes.iter().map(|a| a.shader_location).collect()
    }

    // ── layout ──────────────────────────────────────────────────────────

    #[test]
    fn all_attributes_use_fixed_slots() {
        let (layout, data) = interleave([Some(POS), Some(UV), Some(NRM)], 3).unwrap();
        assert_eq!(layout.stride, 32);
        assert_eq!(locations(&layout), vec![0, 1, 2]);
        assert_eq!(
            layout.attributes.iter().map(|a| a.offset).collect::<Vec<_>>(),
            vec![0, 12, 20]
        );
        assert_eq!(data.len(), 3 * 8);
    }

    #[test]
    fn absent_attributes_get_no_slot() {
        let (layout, _) = interleave([Some(POS), None, Some(NRM)], 3).unwrap();
        assert_eq!(locations(&layout), vec![POSITION_SLOT, NORMAL_SLOT]);
        assert!(!layout.provides(TEXCOORD_SLOT));
        assert_eq!(layout.stride, 24);
        assert_eq!(layout.attributes[1].offset, 12);

        let (layout, _) = interleave([None, Some(UV), None], 3).unwrap();
        assert_eq!(locations(&layout), vec![TEXCOORD_SLOT]);
        assert_eq!(layout.stride, 8);
    }

    #[test]
    fn every_subset_enables_only_present_slots() {
        for mask in 0u8..8 {
            let pick = |bit: u8, data: &'static [f32]| (mask & (1 << bit) != 0).then_some(data);
            let (layout, _) = interleave([pick(0, POS), pick(1, UV), pick(2, NRM)], 3).unwrap();
            for slot in 0..3u32 {
                assert_eq!(layout.provides(slot), mask & (1 << slot) != 0, "mask {mask:03b}");
            }
        }
    }

    // ── packing ─────────────────────────────────────────────────────────

    #[test]
    fn interleaves_per_vertex() {
        let (_, data) = interleave([Some(POS), Some(UV), None], 3).unwrap();
        assert_eq!(&data[0..5], &[0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(&data[5..10], &[1.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(&data[10..15], &[0.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn short_attribute_is_rejected() {
        let err = interleave([Some(POS), Some(&UV[..4]), None], 3).unwrap_err();
        match err {
            LoadError::AttributeLength {
                attribute,
                expected,
                actual,
                ..
            } => {
                assert_eq!(attribute, "texcoords");
                assert_eq!(expected, 6);
                assert_eq!(actual, 4);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn nothing_present_is_empty() {
        let (layout, data) = interleave([None, None, None], 4).unwrap();
        assert_eq!(layout.stride, 0);
        assert!(layout.attributes.is_empty());
        assert!(data.is_empty());
    }
}
