//! Texture descriptions, the texture builder and the wgpu texture wrapper.
//!
//! A [`TextureDesc`] is what the loaders decide (size, mip count, sampler,
//! internal format); an [`Engine`] turns it into a real texture. The
//! [`Texture`] type at the bottom of this module is the wgpu-backed handle
//! created by [`Context`](crate::context::Context).

use anyhow::{Result, bail, ensure};

use crate::data_structures::buffer::CompressedPixelDataType;
use crate::engine::Engine;

/// Number of faces of a cubemap texture.
pub const CUBE_FACE_COUNT: u32 = 6;

/// Passing this to [`TextureBuilder::levels`] requests the full mip chain.
pub const ALL_LEVELS: u32 = 0xff;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SamplerType {
    #[default]
    Sampler2d,
    SamplerCubemap,
}

/// How texels are stored on the GPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    R8,
    Rg8,
    Rgb8,
    Srgb8,
    Rgba8,
    Srgb8A8,
    Rgb16F,
    Rgba16F,
    Rgb32F,
    Rgba32F,
    R11FG11FB10F,
    Rgb9E5,
    Etc2Rgb8,
    Etc2Srgb8,
    Etc2EacRgba8,
    Etc2EacSrgba8,
    Dxt1Rgb,
    Dxt1Rgba,
    Dxt1Srgb,
    Dxt1Srgba,
    Dxt5Rgba,
    Dxt5Srgba,
    Astc4x4Rgba,
    Astc4x4Srgba,
}

impl InternalFormat {
    /// The sRGB twin of an 8-bit color format; other formats are unchanged.
    pub fn with_srgb(self) -> Self {
        match self {
            Self::Rgb8 => Self::Srgb8,
            Self::Rgba8 => Self::Srgb8A8,
            other => other,
        }
    }

    pub fn is_compressed(self) -> bool {
        self.compressed_type().is_some()
    }

    pub fn compressed_type(self) -> Option<CompressedPixelDataType> {
        use CompressedPixelDataType as C;
        Some(match self {
            Self::Etc2Rgb8 => C::Etc2Rgb8,
            Self::Etc2Srgb8 => C::Etc2Srgb8,
            Self::Etc2EacRgba8 => C::Etc2EacRgba8,
            Self::Etc2EacSrgba8 => C::Etc2EacSrgba8,
            Self::Dxt1Rgb => C::Dxt1Rgb,
            Self::Dxt1Rgba => C::Dxt1Rgba,
            Self::Dxt1Srgb => C::Dxt1Srgb,
            Self::Dxt1Srgba => C::Dxt1Srgba,
            Self::Dxt5Rgba => C::Dxt5Rgba,
            Self::Dxt5Srgba => C::Dxt5Srgba,
            Self::Astc4x4Rgba => C::Astc4x4Rgba,
            Self::Astc4x4Srgba => C::Astc4x4Srgba,
            _ => return None,
        })
    }

    /// wgpu has no three-channel formats; RGB data is widened to RGBA on
    /// upload and stored in the matching four-channel format.
    pub fn is_rgb(self) -> bool {
        matches!(self, Self::Rgb8 | Self::Srgb8 | Self::Rgb16F | Self::Rgb32F)
    }

    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        use wgpu::{AstcBlock, AstcChannel, TextureFormat as F};
        match self {
            Self::R8 => F::R8Unorm,
            Self::Rg8 => F::Rg8Unorm,
            Self::Rgb8 | Self::Rgba8 => F::Rgba8Unorm,
            Self::Srgb8 | Self::Srgb8A8 => F::Rgba8UnormSrgb,
            Self::Rgb16F | Self::Rgba16F => F::Rgba16Float,
            Self::Rgb32F | Self::Rgba32F => F::Rgba32Float,
            Self::R11FG11FB10F => F::Rg11b10Ufloat,
            Self::Rgb9E5 => F::Rgb9e5Ufloat,
            Self::Etc2Rgb8 => F::Etc2Rgb8Unorm,
            Self::Etc2Srgb8 => F::Etc2Rgb8UnormSrgb,
            Self::Etc2EacRgba8 => F::Etc2Rgba8Unorm,
            Self::Etc2EacSrgba8 => F::Etc2Rgba8UnormSrgb,
            Self::Dxt1Rgb | Self::Dxt1Rgba => F::Bc1RgbaUnorm,
            Self::Dxt1Srgb | Self::Dxt1Srgba => F::Bc1RgbaUnormSrgb,
            Self::Dxt5Rgba => F::Bc3RgbaUnorm,
            Self::Dxt5Srgba => F::Bc3RgbaUnormSrgb,
            Self::Astc4x4Rgba => F::Astc {
                block: AstcBlock::B4x4,
                channel: AstcChannel::Unorm,
            },
            Self::Astc4x4Srgba => F::Astc {
                block: AstcBlock::B4x4,
                channel: AstcChannel::UnormSrgb,
            },
        }
    }

    /// Device feature needed to sample this format, if any.
    pub fn required_features(self) -> wgpu::Features {
        match self {
            Self::Etc2Rgb8 | Self::Etc2Srgb8 | Self::Etc2EacRgba8 | Self::Etc2EacSrgba8 => {
                wgpu::Features::TEXTURE_COMPRESSION_ETC2
            }
            Self::Dxt1Rgb
            | Self::Dxt1Rgba
            | Self::Dxt1Srgb
            | Self::Dxt1Srgba
            | Self::Dxt5Rgba
            | Self::Dxt5Srgba => wgpu::Features::TEXTURE_COMPRESSION_BC,
            Self::Astc4x4Rgba | Self::Astc4x4Srgba => wgpu::Features::TEXTURE_COMPRESSION_ASTC,
            _ => wgpu::Features::empty(),
        }
    }
}

/// Length of the full mip chain for a `width` x `height` base level.
pub fn max_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Everything the engine needs to allocate a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub levels: u32,
    pub sampler: SamplerType,
    pub format: InternalFormat,
    /// Texels hold RGBM-encoded HDR color; shaders decode them on sampling.
    pub rgbm: bool,
}

impl TextureDesc {
    /// Size of mip `level`, never smaller than 1x1.
    pub fn level_size(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }

    pub fn faces(&self) -> u32 {
        match self.sampler {
            SamplerType::Sampler2d => 1,
            SamplerType::SamplerCubemap => CUBE_FACE_COUNT,
        }
    }
}

/// Fluent construction of a texture, finished by [`TextureBuilder::build`].
#[derive(Clone, Copy, Debug)]
pub struct TextureBuilder {
    width: u32,
    height: u32,
    levels: u32,
    sampler: SamplerType,
    format: InternalFormat,
    rgbm: bool,
}

impl Default for TextureBuilder {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            levels: 1,
            sampler: SamplerType::Sampler2d,
            format: InternalFormat::Rgba8,
            rgbm: false,
        }
    }
}

impl TextureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    /// Mip level count. Values beyond the full chain (such as
    /// [`ALL_LEVELS`]) are clamped to it.
    pub fn levels(mut self, levels: u32) -> Self {
        self.levels = levels;
        self
    }

    pub fn sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn format(mut self, format: InternalFormat) -> Self {
        self.format = format;
        self
    }

    pub fn rgbm(mut self, rgbm: bool) -> Self {
        self.rgbm = rgbm;
        self
    }

    /// Validate the description without creating anything.
    pub fn desc(&self) -> Result<TextureDesc> {
        ensure!(
            self.width > 0 && self.height > 0,
            "texture size must be non-zero, got {}x{}",
            self.width,
            self.height
        );
        ensure!(self.levels > 0, "texture needs at least one mip level");
        if self.sampler == SamplerType::SamplerCubemap && self.width != self.height {
            bail!("cubemap faces must be square, got {}x{}", self.width, self.height);
        }
        if self.rgbm && self.format != InternalFormat::Rgba8 {
            bail!("RGBM textures must use RGBA8, got {:?}", self.format);
        }
        let (block_width, block_height) = self.format.to_wgpu().block_dimensions();
        ensure!(
            self.width % block_width == 0 && self.height % block_height == 0,
            "{:?} textures must be a multiple of {}x{} texels, got {}x{}",
            self.format,
            block_width,
            block_height,
            self.width,
            self.height
        );
        Ok(TextureDesc {
            width: self.width,
            height: self.height,
            levels: self.levels.min(max_levels(self.width, self.height)),
            sampler: self.sampler,
            format: self.format,
            rgbm: self.rgbm,
        })
    }

    pub fn build<E: Engine>(self, engine: &mut E) -> Result<E::Texture> {
        let desc = self.desc()?;
        engine.create_texture(&desc)
    }
}

/// A GPU texture with a view and sampler.
///
/// Wraps the wgpu objects together with the [`TextureDesc`] they were created
/// from, which uploads use to validate level indices and sizes.
#[derive(Clone, Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub desc: TextureDesc,
}

impl Texture {
    /// Allocate an empty texture. Pixel data arrives later through
    /// [`Texture::write_level`].
    pub fn new(device: &wgpu::Device, desc: &TextureDesc, label: Option<&str>) -> Self {
        let format = desc.format.to_wgpu();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.faces(),
            },
            mip_level_count: desc.levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let dimension = match desc.sampler {
            SamplerType::Sampler2d => wgpu::TextureViewDimension::D2,
            SamplerType::SamplerCubemap => wgpu::TextureViewDimension::Cube,
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label,
            dimension: Some(dimension),
            ..Default::default()
        });
        let sampler = create_default_sampler(device);

        Self {
            texture,
            view,
            sampler,
            desc: *desc,
        }
    }

    /// Write tightly packed texels for one face of one mip level.
    pub fn write_level(
        &self,
        queue: &wgpu::Queue,
        level: u32,
        face: u32,
        texels: &[u8],
    ) -> Result<()> {
        ensure!(
            level < self.desc.levels,
            "mip level {} out of range, texture has {}",
            level,
            self.desc.levels
        );
        let (width, height) = self.desc.level_size(level);
        let copy = LevelCopy::new(self.desc.format.to_wgpu(), width, height);
        ensure!(
            texels.len() == copy.byte_len(),
            "level {} of a {}x{} {:?} texture needs {} bytes, got {}",
            level,
            self.desc.width,
            self.desc.height,
            self.desc.format,
            copy.byte_len(),
            texels.len()
        );

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.texture,
                mip_level: level,
                origin: wgpu::Origin3d { x: 0, y: 0, z: face },
            },
            texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(copy.bytes_per_row),
                rows_per_image: Some(copy.rows),
            },
            copy.extent,
        );
        Ok(())
    }
}

/// Copy geometry for one mip level. Block-compressed levels are copied in
/// whole blocks, so the extent is the level size rounded up to the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelCopy {
    pub extent: wgpu::Extent3d,
    pub bytes_per_row: u32,
    pub rows: u32,
}

impl LevelCopy {
    pub fn new(format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let (block_width, block_height) = format.block_dimensions();
        let block_size = format.block_copy_size(None).unwrap_or(4);
        let blocks_wide = width.div_ceil(block_width);
        let blocks_high = height.div_ceil(block_height);
        Self {
            extent: wgpu::Extent3d {
                width: blocks_wide * block_width,
                height: blocks_high * block_height,
                depth_or_array_layers: 1,
            },
            bytes_per_row: blocks_wide * block_size,
            rows: blocks_high,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.bytes_per_row as usize * self.rows as usize
    }
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    })
}
