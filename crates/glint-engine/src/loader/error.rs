use std::path::PathBuf;

/// Errors surfaced by the resource loader.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image {} has no pixels", .path.display())]
    EmptyImage { path: PathBuf },

    #[error(
        "{attribute} needs {expected} floats for {vertex_count} vertices, got {actual}"
    )]
    AttributeLength {
        attribute: &'static str,
        expected: usize,
        actual: usize,
        vertex_count: usize,
    },

    #[error("cubemap face {face} is {width}x{height}, expected {expected}x{expected}")]
    CubemapFace {
        face: &'static str,
        width: u32,
        height: u32,
        expected: u32,
    },

    #[error("buffer read-back failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    #[error("waiting for the GPU during read-back failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("buffer read-back was abandoned before the map completed")]
    ReadbackDropped,
}
