use std::borrow::Cow;

use crate::device::Gpu;

use super::{readback, LoadError};

const WORD: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

/// A GPU buffer bound as a shader storage block.
pub struct ShaderStorageBuffer {
    buffer: wgpu::Buffer,
    size: u64,
}

impl ShaderStorageBuffer {
    /// Capacity requested at load time, in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn free(self) {
        self.buffer.destroy();
        log::debug!("freed storage buffer ({} bytes)", self.size);
    }
}

/// Allocates a storage buffer of `size` bytes, optionally filled from `data`.
///
/// `data` longer than `size` is truncated.
pub fn load_storage_buffer(gpu: &Gpu, data: Option<&[u8]>, size: u64) -> ShaderStorageBuffer {
    let buffer = gpu.create_buffer(&wgpu::BufferDescriptor {
        label: Some("glint storage buffer"),
        size: allocation_size(size),
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });
    let ssbo = ShaderStorageBuffer { buffer, size };

    if let Some(data) = data {
        // Fresh buffers are zero-filled, so zero padding changes nothing.
        let bytes = clamped(data, size);
        if !bytes.is_empty() {
            gpu.queue().write_buffer(&ssbo.buffer, 0, &pad_to_word(bytes, &[]));
        }
    }
    log::debug!("loaded storage buffer ({size} bytes)");
    ssbo
}

/// Overwrites the start of `buffer` with `data`, clamped to its capacity.
///
/// Returns the number of bytes taken from `data`. Bytes past that count are
/// left unchanged: an unaligned tail is completed with the buffer's current
/// contents, read back from the GPU.
pub fn update_storage_buffer(
    gpu: &Gpu,
    buffer: &ShaderStorageBuffer,
    data: &[u8],
) -> Result<u64, LoadError> {
    let bytes = clamped(data, buffer.size);
    let len = bytes.len() as u64;
    if len == 0 {
        return Ok(0);
    }

    // Padding past `size` only covers allocation slack.
    let current_word = if len % WORD != 0 && len < buffer.size {
        readback::read_buffer(gpu, &buffer.buffer, len - len % WORD, WORD)?
    } else {
        Vec::new()
    };
    gpu.queue()
        .write_buffer(&buffer.buffer, 0, &pad_to_word(bytes, &current_word));
    Ok(len)
}

/// Copies the buffer back to the host. Slow: waits for the GPU to go idle.
///
/// The whole buffer is mapped; `min(out.len(), size)` bytes are copied into
/// `out` and that count is returned.
pub fn read_storage_buffer(
    gpu: &Gpu,
    buffer: &ShaderStorageBuffer,
    out: &mut [u8],
) -> Result<usize, LoadError> {
    if (out.len() as u64) < buffer.size {
        log::warn!(
            "storage buffer read-back into {} bytes; buffer holds {}",
            out.len(),
            buffer.size
        );
    }

    let mapped = readback::read_buffer(gpu, &buffer.buffer, 0, buffer.buffer.size())?;
    let copied = readback_len(out.len(), buffer.size);
    out[..copied].copy_from_slice(&mapped[..copied]);

    Ok(copied)
}

/// Allocated size: at least 4 bytes, rounded up to the copy alignment.
pub(crate) fn allocation_size(size: u64) -> u64 {
    size.max(wgpu::COPY_BUFFER_ALIGNMENT)
        .next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
}

pub(crate) fn clamp_write(requested: u64, capacity: u64) -> u64 {
    requested.min(capacity)
}

fn clamped(data: &[u8], capacity: u64) -> &[u8] {
    let len = clamp_write(data.len() as u64, capacity);
    if len < data.len() as u64 {
        log::warn!(
            "storage buffer write of {} bytes clamped to capacity {capacity}",
            data.len()
        );
    }
    &data[..len as usize]
}

/// Extends `bytes` to a whole number of words. Padding bytes come from
/// `current_word` (the existing contents of the last word), or zero.
pub(crate) fn pad_to_word<'a>(bytes: &'a [u8], current_word: &[u8]) -> Cow<'a, [u8]> {
    let rem = bytes.len() % WORD as usize;
    if rem == 0 {
        return Cow::Borrowed(bytes);
    }
    let mut padded = bytes.to_vec();
    padded.extend((rem..WORD as usize).map(|i| current_word.get(i).copied().unwrap_or(0)));
    Cow::Owned(padded)
}

pub(crate) fn readback_len(out_len: usize, capacity: u64) -> usize {
    out_len.min(capacity as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── sizing ──────────────────────────────────────────────────────────

    #[test]
    fn allocation_is_aligned() {
        assert_eq!(allocation_size(0), 4);
        assert_eq!(allocation_size(1), 4);
        assert_eq!(allocation_size(4), 4);
        assert_eq!(allocation_size(10), 12);
        assert_eq!(allocation_size(1024), 1024);
    }

    #[test]
    fn oversized_write_is_clamped() {
        assert_eq!(clamp_write(100, 64), 64);
        assert_eq!(clamp_write(64, 64), 64);
        assert_eq!(clamp_write(10, 64), 10);
        assert_eq!(clamp_write(10, 0), 0);
    }

    // ── padding ─────────────────────────────────────────────────────────

    #[test]
    fn aligned_writes_are_not_copied() {
        let bytes = [1u8; 8];
        assert!(matches!(pad_to_word(&bytes, &[]), Cow::Borrowed(_)));
    }

    #[test]
    fn unaligned_tail_keeps_current_bytes() {
        let padded = pad_to_word(&[0x11; 5], &[0xA0, 0xA1, 0xA2, 0xA3]);
        assert_eq!(&padded[..], &[0x11, 0x11, 0x11, 0x11, 0x11, 0xA1, 0xA2, 0xA3]);
    }

    #[test]
    fn missing_current_word_pads_with_zeros() {
        let padded = pad_to_word(&[7, 7], &[]);
        assert_eq!(&padded[..], &[7, 7, 0, 0]);
    }

    // ── read-back ───────────────────────────────────────────────────────

    #[test]
    fn readback_never_exceeds_either_side() {
        assert_eq!(readback_len(16, 64), 16);
        assert_eq!(readback_len(128, 64), 64);
        assert_eq!(readback_len(0, 64), 0);
    }
}
