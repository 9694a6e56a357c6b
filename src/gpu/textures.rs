use anyhow::*;
use image::{GenericImageView, Rgba, RgbaImage};

/// Stores a WGPU texture along with its associated view.
///
/// Samplers are shared by every texture of the same kind and are owned by the
/// device instead.
#[derive(Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    /// True for depth textures, which bind through the shadow map slots.
    pub is_depth: bool,
}

impl Texture {
    pub const DEPTH_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Construct a texture represented by `image_bytes` which must be a JPEG,
    /// PNG or other format the `image` crate can decode.
    pub fn from_image_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image_bytes: &[u8],
        label: Option<&str>,
    ) -> Result<Self> {
        let image = image::load_from_memory(image_bytes)?;
        Ok(Self::from_image(device, queue, &image, label))
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &image::DynamicImage,
        label: Option<&str>,
    ) -> Self {
        let rgba = image.to_rgba8();
        let dims = image.dimensions();

        let size = wgpu::Extent3d {
            width: dims.0,
            height: dims.1,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * dims.0),
                rows_per_image: Some(dims.1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            is_depth: false,
        }
    }

    /// Create a 1x1 texture of a single color.
    pub fn solid_color(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color: [u8; 4],
        label: Option<&str>,
    ) -> Self {
        let image = RgbaImage::from_pixel(1, 1, Rgba(color));
        Self::from_image(device, queue, &image.into(), label)
    }

    /// Create a depth texture that can be both rendered into and sampled.
    pub fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        label: Option<&str>,
    ) -> Self {
        // Including `TextureUsages::RENDER_ATTACHMENT` in the usage flags
        // ensures depth information can be written to this texture.
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            is_depth: true,
        }
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }
}

/// Sampler used for every color texture.
pub fn create_color_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("color sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Comparison sampler used to look up shadow maps.
///
/// Setting `compare` to `LessEqual` makes a lookup return 1.0 when the
/// fragment is at or in front of the stored occluder depth.
pub fn create_shadow_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("shadow sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        compare: Some(wgpu::CompareFunction::LessEqual),
        lod_min_clamp: 0.0,
        lod_max_clamp: 100.0,
        ..Default::default()
    })
}

/// Vertical gradient from `horizon` at the middle row to `zenith` at the top
/// and `ground` at the bottom, for use as an equirectangular sky.
pub fn sky_gradient_image(
    width: u32,
    height: u32,
    zenith: [u8; 3],
    horizon: [u8; 3],
    ground: [u8; 3],
) -> RgbaImage {
    let lerp = |a: [u8; 3], b: [u8; 3], t: f32| {
        let channel = |i: usize| (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
        Rgba([channel(0), channel(1), channel(2), 255])
    };

    RgbaImage::from_fn(width, height, |_, y| {
        let t = y as f32 / (height.max(2) - 1) as f32;
        if t < 0.5 {
            lerp(zenith, horizon, t * 2.0)
        } else {
            lerp(horizon, ground, (t - 0.5) * 2.0)
        }
    })
}

/// Checkerboard of `cells` x `cells` squares alternating between two colors.
pub fn checker_image(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> RgbaImage {
    let cell_size = (size / cells.max(1)).max(1);

    RgbaImage::from_fn(size, size, |x, y| {
        if (x / cell_size + y / cell_size) % 2 == 0 {
            Rgba(a)
        } else {
            Rgba(b)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sky_gradient_hits_every_stop() {
        let image = sky_gradient_image(4, 5, [0, 0, 255], [255, 255, 255], [0, 255, 0]);

        assert_eq!(&Rgba([0, 0, 255, 255]), image.get_pixel(0, 0));
        assert_eq!(&Rgba([255, 255, 255, 255]), image.get_pixel(3, 2));
        assert_eq!(&Rgba([0, 255, 0, 255]), image.get_pixel(1, 4));
    }

    #[test]
    fn checker_alternates() {
        let (a, b) = ([0, 0, 0, 255], [255, 255, 255, 255]);
        let image = checker_image(8, 4, a, b);

        assert_eq!(&Rgba(a), image.get_pixel(0, 0));
        assert_eq!(&Rgba(b), image.get_pixel(2, 0));
        assert_eq!(&Rgba(b), image.get_pixel(0, 2));
        assert_eq!(&Rgba(a), image.get_pixel(2, 2));
    }
}
