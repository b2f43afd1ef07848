//! PNG decoding into tightly packed 8-bit pixels.

use anyhow::{Context as _, Result, bail};
use image::{DynamicImage, ImageFormat, load_from_memory_with_format};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedPng {
    pub width: u32,
    pub height: u32,
    /// Row-major pixels with `channels` bytes each.
    pub data: Vec<u8>,
    pub channels: u32,
}

/// Decode PNG bytes to RGB8 (`channels == 3`) or RGBA8 (`channels == 4`).
pub fn decode_png(bytes: &[u8], channels: u32) -> Result<DecodedPng> {
    let img = load_from_memory_with_format(bytes, ImageFormat::Png)
        .context("failed to decode PNG data")?;
    from_image(&img, channels)
}

pub(crate) fn from_image(img: &DynamicImage, channels: u32) -> Result<DecodedPng> {
    let (width, height, data) = match channels {
        3 => {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            (w, h, rgb.into_raw())
        }
        4 => {
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            (w, h, rgba.into_raw())
        }
        other => bail!("PNG decode supports 3 or 4 channels, got {other}"),
    };
    Ok(DecodedPng {
        width,
        height,
        data,
        channels,
    })
}

#[cfg(test)]
pub(crate) fn encode_png(img: &DynamicImage) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)
        .expect("PNG encoding of an in-memory image");
    bytes.into_inner()
}
