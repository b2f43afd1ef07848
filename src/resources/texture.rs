//! Texture, indirect light and skybox loaders for KTX and PNG assets.

use anyhow::{Context as _, Result, ensure};
use image::{ImageBuffer, Pixel, RgbImage, RgbaImage, imageops::FilterType};

use crate::data_structures::{
    buffer::{CompressedPixelDataType, PixelBufferDescriptor, PixelDataFormat, PixelDataType},
    light::{DEFAULT_IBL_INTENSITY, IndirectLightBuilder, SkyboxBuilder, SphericalHarmonics},
    texture::{ALL_LEVELS, InternalFormat, SamplerType, TextureBuilder, TextureDesc},
};
use crate::engine::Engine;
use crate::resources::ktx::{KtxBundle, KtxInfo, gl};
use crate::resources::png::{DecodedPng, decode_png};

/// Switches shared by the texture loaders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureOptions {
    /// Store 8-bit color in an sRGB format.
    pub srgb: bool,
    /// The texels are RGBM-encoded HDR color. Takes precedence over `srgb`.
    pub rgbm: bool,
    /// PNG only: drop the alpha channel.
    pub noalpha: bool,
    /// PNG only: upload the base level without a mip chain.
    pub nomips: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IblOptions {
    pub texture: TextureOptions,
    pub intensity: f32,
}

impl Default for IblOptions {
    fn default() -> Self {
        Self {
            texture: TextureOptions::default(),
            intensity: DEFAULT_IBL_INTENSITY,
        }
    }
}

/// Internal format named by a KTX `glInternalFormat`.
pub fn texture_format(info: &KtxInfo) -> Option<InternalFormat> {
    use InternalFormat as F;
    Some(match info.gl_internal_format {
        gl::R8 => F::R8,
        gl::RG8 => F::Rg8,
        gl::RGB8 => F::Rgb8,
        gl::SRGB8 => F::Srgb8,
        gl::RGBA8 => F::Rgba8,
        gl::SRGB8_ALPHA8 => F::Srgb8A8,
        gl::RGB16F => F::Rgb16F,
        gl::RGBA16F => F::Rgba16F,
        gl::RGB32F => F::Rgb32F,
        gl::RGBA32F => F::Rgba32F,
        gl::R11F_G11F_B10F => F::R11FG11FB10F,
        gl::RGB9_E5 => F::Rgb9E5,
        gl::COMPRESSED_RGB8_ETC2 => F::Etc2Rgb8,
        gl::COMPRESSED_SRGB8_ETC2 => F::Etc2Srgb8,
        gl::COMPRESSED_RGBA8_ETC2_EAC => F::Etc2EacRgba8,
        gl::COMPRESSED_SRGB8_ALPHA8_ETC2_EAC => F::Etc2EacSrgba8,
        gl::COMPRESSED_RGB_S3TC_DXT1 => F::Dxt1Rgb,
        gl::COMPRESSED_RGBA_S3TC_DXT1 => F::Dxt1Rgba,
        gl::COMPRESSED_SRGB_S3TC_DXT1 => F::Dxt1Srgb,
        gl::COMPRESSED_SRGB_ALPHA_S3TC_DXT1 => F::Dxt1Srgba,
        gl::COMPRESSED_RGBA_S3TC_DXT5 => F::Dxt5Rgba,
        gl::COMPRESSED_SRGB_ALPHA_S3TC_DXT5 => F::Dxt5Srgba,
        gl::COMPRESSED_RGBA_ASTC_4X4 => F::Astc4x4Rgba,
        gl::COMPRESSED_SRGB8_ALPHA8_ASTC_4X4 => F::Astc4x4Srgba,
        _ => return None,
    })
}

/// Pixel layout named by a KTX `glFormat`.
pub fn pixel_data_format(info: &KtxInfo) -> Option<PixelDataFormat> {
    match info.gl_format {
        gl::RED => Some(PixelDataFormat::R),
        gl::RG => Some(PixelDataFormat::Rg),
        gl::RGB => Some(PixelDataFormat::Rgb),
        gl::RGBA => Some(PixelDataFormat::Rgba),
        _ => None,
    }
}

/// Component type named by a KTX `glType`.
pub fn pixel_data_type(info: &KtxInfo) -> Option<PixelDataType> {
    match info.gl_type {
        gl::UNSIGNED_BYTE => Some(PixelDataType::UByte),
        gl::UNSIGNED_SHORT => Some(PixelDataType::UShort),
        gl::HALF_FLOAT => Some(PixelDataType::Half),
        gl::FLOAT => Some(PixelDataType::Float),
        gl::UNSIGNED_INT_10F_11F_11F_REV => Some(PixelDataType::UInt10F11F11FRev),
        gl::UNSIGNED_INT_5_9_9_9_REV => Some(PixelDataType::UInt5999Rev),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug)]
enum KtxPixels {
    Uncompressed(PixelDataFormat, PixelDataType),
    Compressed(CompressedPixelDataType),
}

impl KtxPixels {
    fn resolve(info: &KtxInfo, format: InternalFormat) -> Option<Self> {
        if let Some(compressed) = format.compressed_type() {
            return Some(Self::Compressed(compressed));
        }
        Some(Self::Uncompressed(
            pixel_data_format(info)?,
            pixel_data_type(info)?,
        ))
    }

    fn buffer(self, bytes: &[u8], face_size: Option<usize>) -> Result<PixelBufferDescriptor> {
        match self {
            Self::Uncompressed(format, datatype) => {
                PixelBufferDescriptor::new(bytes, format, datatype)
            }
            Self::Compressed(datatype) => {
                PixelBufferDescriptor::compressed(bytes, datatype, face_size)
            }
        }
    }
}

/// Parse KTX bytes and create a texture from them.
///
/// Returns `Ok(None)` (after logging an error) when the pixel format is not
/// one the engine understands.
pub fn create_texture_from_ktx<E: Engine>(
    engine: &mut E,
    bytes: &[u8],
    options: &TextureOptions,
) -> Result<Option<E::Texture>> {
    let ktx = KtxBundle::from_bytes(bytes).context("failed to parse KTX texture")?;
    create_texture_from_ktx_bundle(engine, &ktx, options)
}

pub fn create_texture_from_ktx_bundle<E: Engine>(
    engine: &mut E,
    ktx: &KtxBundle,
    options: &TextureOptions,
) -> Result<Option<E::Texture>> {
    let info = ktx.info();
    let Some(stored) = texture_format(info) else {
        log::error!(
            "Unsupported KTX internal format {:#06x}",
            info.gl_internal_format
        );
        return Ok(None);
    };
    let Some(pixels) = KtxPixels::resolve(info, stored) else {
        log::error!(
            "Unsupported KTX pixel data (format {:#06x}, type {:#06x})",
            info.gl_format,
            info.gl_type
        );
        return Ok(None);
    };

    let rgba8 = matches!(stored, InternalFormat::Rgba8 | InternalFormat::Srgb8A8)
        && matches!(
            pixels,
            KtxPixels::Uncompressed(PixelDataFormat::Rgba, PixelDataType::UByte)
        );
    if options.rgbm && !rgba8 {
        log::error!("RGBM needs 8-bit RGBA pixel data, KTX holds {:?}", stored);
        return Ok(None);
    }

    let format = if options.rgbm {
        InternalFormat::Rgba8
    } else if options.srgb {
        stored.with_srgb()
    } else {
        stored
    };
    let sampler = if ktx.is_cubemap() {
        SamplerType::SamplerCubemap
    } else {
        SamplerType::Sampler2d
    };

    let desc = TextureBuilder::new()
        .width(info.pixel_width)
        .height(info.pixel_height)
        .levels(ktx.num_mip_levels())
        .sampler(sampler)
        .format(format)
        .rgbm(options.rgbm)
        .desc()?;
    let texture = engine.create_texture(&desc)?;

    for level in 0..desc.levels {
        if ktx.is_cubemap() {
            let bytes = ktx
                .cube_blob(level)
                .with_context(|| format!("KTX cubemap is missing level {level}"))?;
            let face_size = bytes.len() / 6;
            engine.set_image_cube(&texture, level, pixels.buffer(&bytes, Some(face_size))?)?;
        } else {
            let bytes = ktx
                .blob(level, 0, 0)
                .with_context(|| format!("KTX texture is missing level {level}"))?;
            engine.set_image(&texture, level, pixels.buffer(bytes, None)?)?;
        }
    }

    log::info!(
        "Loaded KTX {} {}x{} {:?} with {} levels",
        if ktx.is_cubemap() { "cubemap" } else { "texture" },
        desc.width,
        desc.height,
        desc.format,
        desc.levels
    );
    Ok(Some(texture))
}

/// Build an indirect light from a cmgen-style KTX: a prefiltered reflection
/// cubemap plus spherical harmonics in the `sh` metadata entry.
pub fn create_ibl_from_ktx<E: Engine>(
    engine: &mut E,
    bytes: &[u8],
    options: &IblOptions,
) -> Result<Option<E::IndirectLight>> {
    let ktx = KtxBundle::from_bytes(bytes).context("failed to parse IBL KTX")?;
    create_ibl_from_ktx_bundle(engine, &ktx, options)
}

pub fn create_ibl_from_ktx_bundle<E: Engine>(
    engine: &mut E,
    ktx: &KtxBundle,
    options: &IblOptions,
) -> Result<Option<E::IndirectLight>> {
    let format = ktx.info().gl_internal_format;
    if ![gl::R11F_G11F_B10F, gl::RGB16F, gl::RGB32F].contains(&format) {
        log::warn!(
            "IBL texture format is {format:#x} which is not an expected floating-point format. \
             Please use cmgen to generate IBL."
        );
    }

    let sh = ktx
        .metadata("sh")
        .context("IBL KTX has no 'sh' metadata entry")?;
    let irradiance = SphericalHarmonics::parse(3, sh)?;

    let Some(reflections) = create_texture_from_ktx_bundle(engine, ktx, &options.texture)? else {
        return Ok(None);
    };
    IndirectLightBuilder::new()
        .reflections(reflections)
        .irradiance(irradiance)
        .intensity(options.intensity)
        .build(engine)
        .map(Some)
}

pub fn create_sky_from_ktx<E: Engine>(
    engine: &mut E,
    bytes: &[u8],
    options: &TextureOptions,
) -> Result<Option<E::Skybox>> {
    let ktx = KtxBundle::from_bytes(bytes).context("failed to parse skybox KTX")?;
    create_sky_from_ktx_bundle(engine, &ktx, options)
}

pub fn create_sky_from_ktx_bundle<E: Engine>(
    engine: &mut E,
    ktx: &KtxBundle,
    options: &TextureOptions,
) -> Result<Option<E::Skybox>> {
    ensure!(ktx.is_cubemap(), "skybox KTX must be a cubemap");
    let Some(environment) = create_texture_from_ktx_bundle(engine, ktx, options)? else {
        return Ok(None);
    };
    SkyboxBuilder::new()
        .environment(environment)
        .build(engine)
        .map(Some)
}

/// Decode a PNG and upload it, with a full mip chain unless `nomips` is set.
pub fn create_texture_from_png<E: Engine>(
    engine: &mut E,
    bytes: &[u8],
    options: &TextureOptions,
) -> Result<E::Texture> {
    let channels = if options.noalpha { 3 } else { 4 };
    let decoded = decode_png(bytes, channels)?;

    let (format, pixel_format) = if options.noalpha {
        (InternalFormat::Rgb8, PixelDataFormat::Rgb)
    } else {
        (InternalFormat::Rgba8, PixelDataFormat::Rgba)
    };
    let format = if options.srgb {
        format.with_srgb()
    } else {
        format
    };

    let desc = TextureBuilder::new()
        .width(decoded.width)
        .height(decoded.height)
        .levels(if options.nomips { 1 } else { ALL_LEVELS })
        .sampler(SamplerType::Sampler2d)
        .format(format)
        .desc()?;
    let texture = engine.create_texture(&desc)?;

    for (level, texels) in mip_chain(decoded, &desc)?.into_iter().enumerate() {
        let pixels = PixelBufferDescriptor::from_vec(texels, pixel_format, PixelDataType::UByte)?;
        engine.set_image(&texture, level as u32, pixels)?;
    }

    log::info!(
        "Loaded PNG texture {}x{} {:?} with {} levels",
        desc.width,
        desc.height,
        desc.format,
        desc.levels
    );
    Ok(texture)
}

/// Base level followed by successively halved levels, each filtered from the
/// one before.
fn mip_chain(decoded: DecodedPng, desc: &TextureDesc) -> Result<Vec<Vec<u8>>> {
    let DecodedPng {
        width,
        height,
        data,
        channels,
    } = decoded;
    match channels {
        3 => {
            let base = RgbImage::from_raw(width, height, data)
                .context("decoded PNG size does not match its pixels")?;
            Ok(downsample(base, desc))
        }
        _ => {
            let base = RgbaImage::from_raw(width, height, data)
                .context("decoded PNG size does not match its pixels")?;
            Ok(downsample(base, desc))
        }
    }
}

fn downsample<P>(base: ImageBuffer<P, Vec<u8>>, desc: &TextureDesc) -> Vec<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let mut levels = Vec::with_capacity(desc.levels as usize);
    let mut current = base;
    for level in 1..desc.levels {
        let (width, height) = desc.level_size(level);
        let next = image::imageops::resize(&current, width, height, FilterType::Triangle);
        levels.push(std::mem::replace(&mut current, next).into_raw());
    }
    levels.push(current.into_raw());
    levels
}

/// Loader entry points as methods on any [`Engine`].
pub trait EngineExt: Engine + Sized {
    fn create_texture_from_ktx(
        &mut self,
        bytes: &[u8],
        options: &TextureOptions,
    ) -> Result<Option<Self::Texture>> {
        create_texture_from_ktx(self, bytes, options)
    }

    fn create_ibl_from_ktx(
        &mut self,
        bytes: &[u8],
        options: &IblOptions,
    ) -> Result<Option<Self::IndirectLight>> {
        create_ibl_from_ktx(self, bytes, options)
    }

    fn create_sky_from_ktx(
        &mut self,
        bytes: &[u8],
        options: &TextureOptions,
    ) -> Result<Option<Self::Skybox>> {
        create_sky_from_ktx(self, bytes, options)
    }

    fn create_texture_from_png(
        &mut self,
        bytes: &[u8],
        options: &TextureOptions,
    ) -> Result<Self::Texture> {
        create_texture_from_png(self, bytes, options)
    }
}

impl<E: Engine> EngineExt for E {}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(internal: u32, format: u32, ty: u32) -> KtxInfo {
        KtxInfo {
            gl_type: ty,
            gl_format: format,
            gl_internal_format: internal,
            ..Default::default()
        }
    }

    #[test]
    fn gl_enums_map_to_engine_formats() {
        let hdr = info(gl::R11F_G11F_B10F, gl::RGB, gl::UNSIGNED_INT_10F_11F_11F_REV);
        assert_eq!(texture_format(&hdr), Some(InternalFormat::R11FG11FB10F));
        assert_eq!(pixel_data_format(&hdr), Some(PixelDataFormat::Rgb));
        assert_eq!(pixel_data_type(&hdr), Some(PixelDataType::UInt10F11F11FRev));

        let astc = info(gl::COMPRESSED_SRGB8_ALPHA8_ASTC_4X4, 0, 0);
        assert_eq!(texture_format(&astc), Some(InternalFormat::Astc4x4Srgba));
        assert!(matches!(
            KtxPixels::resolve(&astc, InternalFormat::Astc4x4Srgba),
            Some(KtxPixels::Compressed(CompressedPixelDataType::Astc4x4Srgba))
        ));
    }

    #[test]
    fn unknown_pixel_data_is_unresolved() {
        let odd = info(gl::RGBA8, 0x9999, gl::UNSIGNED_BYTE);
        assert_eq!(texture_format(&odd), Some(InternalFormat::Rgba8));
        assert!(KtxPixels::resolve(&odd, InternalFormat::Rgba8).is_none());
    }

    #[test]
    fn mip_chain_halves_each_level() {
        let desc = TextureBuilder::new()
            .width(4)
            .height(2)
            .levels(ALL_LEVELS)
            .desc()
            .unwrap();
        let decoded = DecodedPng {
            width: 4,
            height: 2,
            data: vec![200; 4 * 2 * 3],
            channels: 3,
        };
        let levels = mip_chain(decoded, &desc).unwrap();
        let sizes: Vec<usize> = levels.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![24, 6, 3]);
        assert!(levels[2].iter().all(|&b| b.abs_diff(200) <= 1));
    }
}
