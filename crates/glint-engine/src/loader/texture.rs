use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::device::Gpu;
use crate::render::Sampled;

use super::mipmap;
use super::LoadError;

/// Format every decoded image is uploaded as.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A mipmapped 2D RGBA8 texture with its view and sampler.
pub struct Texture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    size: (u32, u32),
    mip_levels: u32,
}

impl Texture {
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn free(self) {
        self.texture.destroy();
        log::debug!("freed texture {}x{}", self.size.0, self.size.1);
    }
}

impl Sampled for Texture {
    fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

/// Decodes `path` (flipped vertically, so row 0 is the bottom) and uploads it
/// with a full mip chain, repeat wrapping and trilinear filtering.
pub fn load_texture(gpu: &Gpu, path: impl AsRef<Path>) -> Result<Texture, LoadError> {
    let path = path.as_ref();
    let pixels = decode(path, true)?;
    log::debug!(
        "decoded {} ({}x{})",
        path.display(),
        pixels.width(),
        pixels.height()
    );
    Ok(texture_from_rgba(gpu, pixels))
}

/// Uploads already-decoded RGBA8 pixels, generating mipmaps on the host.
pub fn texture_from_rgba(gpu: &Gpu, pixels: RgbaImage) -> Texture {
    let (width, height) = pixels.dimensions();
    let chain = mipmap::mip_chain(pixels);
    let mip_levels = chain.len() as u32;

    let texture = gpu.create_texture(&wgpu::TextureDescriptor {
        label: Some("glint texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: mip_levels,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (mip, level) in chain.iter().enumerate() {
        mipmap::write_level(gpu.queue(), &texture, 0, mip as u32, level);
    }
    // Host pixels (`chain`) are dropped here, after upload is queued.

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = gpu.device().create_sampler(&wgpu::SamplerDescriptor {
        label: Some("glint texture sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    });

    Texture {
        texture,
        view,
        sampler,
        size: (width, height),
        mip_levels,
    }
}

/// Reads and decodes an image file into 4-channel RGBA8.
pub(crate) fn decode(path: &Path, flip_vertical: bool) -> Result<RgbaImage, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: PathBuf::from(path),
        source,
    })?;
    let mut image = image::load_from_memory(&bytes).map_err(|source| LoadError::Decode {
        path: PathBuf::from(path),
        source,
    })?;

    if image.width() == 0 || image.height() == 0 {
        return Err(LoadError::EmptyImage {
            path: PathBuf::from(path),
        });
    }
    if flip_vertical {
        image = image.flipv();
    }
    Ok(image.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("glint-texture-{}-{name}", std::process::id()))
    }

    #[test]
    fn decode_flips_rows_when_asked() {
        let path = fixture("flip.png");
        let mut img = RgbaImage::new(1, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        img.save(&path).unwrap();

        let upright = decode(&path, false).unwrap();
        let flipped = decode(&path, true).unwrap();
        assert_eq!(upright.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(flipped.get_pixel(0, 0).0, [0, 0, 255, 255]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn grayscale_is_expanded_to_rgba() {
        let path = fixture("gray.png");
        image::GrayImage::from_pixel(2, 2, image::Luma([90])).save(&path).unwrap();

        let rgba = decode(&path, false).unwrap();
        assert_eq!(rgba.get_pixel(1, 1).0, [90, 90, 90, 255]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let path = fixture("garbage.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let err = decode(&path, true).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }), "{err}");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = decode(Path::new("/no/such/glint/image.png"), true).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
