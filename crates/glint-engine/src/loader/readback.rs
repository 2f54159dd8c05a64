use crate::device::Gpu;

use super::LoadError;

/// Copies `size` bytes at `offset` of `source` to the host. Blocks until the
/// GPU has finished all queued work.
pub(crate) fn read_buffer(
    gpu: &Gpu,
    source: &wgpu::Buffer,
    offset: u64,
    size: u64,
) -> Result<Vec<u8>, LoadError> {
    let staging = staging_buffer(gpu, size);

    let mut encoder = gpu
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("glint buffer read-back encoder"),
        });
    encoder.copy_buffer_to_buffer(source, offset, &staging, 0, size);
    gpu.queue().submit(std::iter::once(encoder.finish()));

    map_blocking(gpu, &staging)?;
    let bytes = staging.slice(..).get_mapped_range().to_vec();
    staging.unmap();
    staging.destroy();
    Ok(bytes)
}

/// Copies mip 0 of an RGBA8 texture to the host as tightly packed rows, top
/// row first.
pub(crate) fn read_texture_rgba8(
    gpu: &Gpu,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, LoadError> {
    let row_bytes = width * 4;
    let padded_row = row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
    let staging = staging_buffer(gpu, padded_row as u64 * height as u64);

    let mut encoder = gpu
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("glint texture read-back encoder"),
        });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue().submit(std::iter::once(encoder.finish()));

    map_blocking(gpu, &staging)?;
    let mut pixels = Vec::with_capacity((row_bytes * height) as usize);
    {
        let mapped = staging.slice(..).get_mapped_range();
        for row in mapped.chunks(padded_row as usize) {
            pixels.extend_from_slice(&row[..row_bytes as usize]);
        }
    }
    staging.unmap();
    staging.destroy();
    Ok(pixels)
}

fn staging_buffer(gpu: &Gpu, size: u64) -> wgpu::Buffer {
    gpu.create_buffer(&wgpu::BufferDescriptor {
        label: Some("glint read-back staging"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    })
}

/// Maps `staging` for reading and waits for the map to land.
fn map_blocking(gpu: &Gpu, staging: &wgpu::Buffer) -> Result<(), LoadError> {
    let (tx, rx) = std::sync::mpsc::channel();
    staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    gpu.device().poll(wgpu::PollType::wait_indefinitely())?;
    rx.recv().map_err(|_| LoadError::ReadbackDropped)??;
    Ok(())
}
