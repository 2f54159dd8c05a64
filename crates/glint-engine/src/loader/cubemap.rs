use std::path::Path;

use image::RgbaImage;

use crate::device::Gpu;
use crate::render::Sampled;

use super::texture::{decode, TEXTURE_FORMAT};
use super::{mipmap, LoadError};

/// Cube faces in upload order. The array index is the texture layer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CubeFace {
    Right,
    Left,
    Top,
    Bottom,
    Front,
    Back,
}

impl CubeFace {
    /// Parameter order of [`load_cubemap`]: right, left, top, bottom, front, back.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::Right,
        CubeFace::Left,
        CubeFace::Top,
        CubeFace::Bottom,
        CubeFace::Front,
        CubeFace::Back,
    ];

    /// Array layer of this face in a cube texture (+X, -X, +Y, -Y, +Z, -Z).
    pub fn layer(self) -> u32 {
        match self {
            CubeFace::Right => 0,
            CubeFace::Left => 1,
            CubeFace::Top => 2,
            CubeFace::Bottom => 3,
            CubeFace::Front => 4,
            CubeFace::Back => 5,
        }
    }

    pub fn axis(self) -> &'static str {
        match self {
            CubeFace::Right => "+X",
            CubeFace::Left => "-X",
            CubeFace::Top => "+Y",
            CubeFace::Bottom => "-Y",
            CubeFace::Front => "+Z",
            CubeFace::Back => "-Z",
        }
    }
}

pub struct Cubemap {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    face_size: u32,
}

impl Cubemap {
    /// Edge length of each square face.
    pub fn face_size(&self) -> u32 {
        self.face_size
    }

    pub fn free(self) {
        self.texture.destroy();
        log::debug!("freed cubemap ({}px faces)", self.face_size);
    }
}

impl Sampled for Cubemap {
    fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

/// Loads six face images, given as right, left, top, bottom, front, back.
///
/// Faces are not flipped. They must be square and share one size.
pub fn load_cubemap<P: AsRef<Path>>(gpu: &Gpu, faces: [P; 6]) -> Result<Cubemap, LoadError> {
    let mut images = Vec::with_capacity(6);
    for (face, path) in CubeFace::ALL.into_iter().zip(&faces) {
        images.push((face, decode(path.as_ref(), false)?));
    }
    let face_size = check_faces(&images)?;

    let mip_levels = mipmap::mip_level_count(face_size, face_size);
    let texture = gpu.create_texture(&wgpu::TextureDescriptor {
        label: Some("glint cubemap"),
        size: wgpu::Extent3d {
            width: face_size,
            height: face_size,
            depth_or_array_layers: 6,
        },
        mip_level_count: mip_levels,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (face, pixels) in images {
        log::trace!("uploading cubemap face {}", face.axis());
        for (mip, level) in mipmap::mip_chain(pixels).iter().enumerate() {
            mipmap::write_level(gpu.queue(), &texture, face.layer(), mip as u32, level);
        }
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("glint cubemap view"),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    });
    let sampler = gpu.device().create_sampler(&wgpu::SamplerDescriptor {
        label: Some("glint cubemap sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    });

    log::debug!("loaded cubemap ({face_size}px faces, {mip_levels} mips)");

    Ok(Cubemap {
        texture,
        view,
        sampler,
        face_size,
    })
}

/// Returns the common face size, or the first face that is not square or
/// does not match the first face.
fn check_faces(images: &[(CubeFace, RgbaImage)]) -> Result<u32, LoadError> {
    let expected = images.first().map(|(_, img)| img.width()).unwrap_or(0);
    for (face, img) in images {
        let (width, height) = img.dimensions();
        if width != expected || height != expected {
            return Err(LoadError::CubemapFace {
                face: face.axis(),
                width,
                height,
                expected,
            });
        }
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faces_map_to_layers_in_parameter_order() {
        let layers: Vec<u32> = CubeFace::ALL.iter().map(|f| f.layer()).collect();
        assert_eq!(layers, vec![0, 1, 2, 3, 4, 5]);

        let axes: Vec<&str> = CubeFace::ALL.iter().map(|f| f.axis()).collect();
        assert_eq!(axes, vec!["+X", "-X", "+Y", "-Y", "+Z", "-Z"]);
    }

    #[test]
    fn matching_square_faces_pass() {
        let images: Vec<_> = CubeFace::ALL
            .into_iter()
            .map(|f| (f, RgbaImage::new(16, 16)))
            .collect();
        assert_eq!(check_faces(&images).unwrap(), 16);
    }

    #[test]
    fn mismatched_face_is_named() {
        let mut images: Vec<_> = CubeFace::ALL
            .into_iter()
            .map(|f| (f, RgbaImage::new(16, 16)))
            .collect();
        images[3].1 = RgbaImage::new(16, 8);

        match check_faces(&images).unwrap_err() {
            LoadError::CubemapFace {
                face,
                width,
                height,
                expected,
            } => {
                assert_eq!(face, "-Y");
                assert_eq!((width, height, expected), (16, 8, 16));
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
