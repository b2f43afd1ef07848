//! KTX 1.1 container reading and writing.
//!
//! A KTX file is a fixed 64-byte header, a block of key/value metadata and
//! the image data, level by level. Within a level the data is ordered by
//! array element, then cube face. Only little-endian files are accepted; the
//! engine never produces anything else.

use std::collections::BTreeMap;

use anyhow::{Context as _, Result, bail, ensure};

pub const KTX_IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x31, 0x31, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];
const ENDIANNESS: u32 = 0x0403_0201;
const HEADER_SIZE: usize = 64;
// a u32 edge has at most 32 levels
const MAX_MIP_LEVELS: u32 = 32;

/// GL enums that appear in KTX headers.
pub mod gl {
    pub const UNSIGNED_BYTE: u32 = 0x1401;
    pub const UNSIGNED_SHORT: u32 = 0x1403;
    pub const FLOAT: u32 = 0x1406;
    pub const HALF_FLOAT: u32 = 0x140B;
    pub const UNSIGNED_INT_10F_11F_11F_REV: u32 = 0x8C3B;
    pub const UNSIGNED_INT_5_9_9_9_REV: u32 = 0x8C3E;

    pub const RED: u32 = 0x1903;
    pub const RG: u32 = 0x8227;
    pub const RGB: u32 = 0x1907;
    pub const RGBA: u32 = 0x1908;

    pub const R8: u32 = 0x8229;
    pub const RG8: u32 = 0x822B;
    pub const RGB8: u32 = 0x8051;
    pub const RGBA8: u32 = 0x8058;
    pub const SRGB8: u32 = 0x8C41;
    pub const SRGB8_ALPHA8: u32 = 0x8C43;
    pub const RGB16F: u32 = 0x881B;
    pub const RGBA16F: u32 = 0x881A;
    pub const RGB32F: u32 = 0x8815;
    pub const RGBA32F: u32 = 0x8814;
    pub const R11F_G11F_B10F: u32 = 0x8C3A;
    pub const RGB9_E5: u32 = 0x8C3D;

    pub const COMPRESSED_RGB8_ETC2: u32 = 0x9274;
    pub const COMPRESSED_SRGB8_ETC2: u32 = 0x9275;
    pub const COMPRESSED_RGBA8_ETC2_EAC: u32 = 0x9278;
    pub const COMPRESSED_SRGB8_ALPHA8_ETC2_EAC: u32 = 0x9279;
    pub const COMPRESSED_RGB_S3TC_DXT1: u32 = 0x83F0;
    pub const COMPRESSED_RGBA_S3TC_DXT1: u32 = 0x83F1;
    pub const COMPRESSED_RGBA_S3TC_DXT5: u32 = 0x83F3;
    pub const COMPRESSED_SRGB_S3TC_DXT1: u32 = 0x8C4C;
    pub const COMPRESSED_SRGB_ALPHA_S3TC_DXT1: u32 = 0x8C4D;
    pub const COMPRESSED_SRGB_ALPHA_S3TC_DXT5: u32 = 0x8C4F;
    pub const COMPRESSED_RGBA_ASTC_4X4: u32 = 0x93B0;
    pub const COMPRESSED_SRGB8_ALPHA8_ASTC_4X4: u32 = 0x93D0;
}

/// The KTX header fields after the identifier and endianness marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KtxInfo {
    pub gl_type: u32,
    pub gl_type_size: u32,
    pub gl_format: u32,
    pub gl_internal_format: u32,
    pub gl_base_internal_format: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub pixel_depth: u32,
    pub number_of_array_elements: u32,
    pub number_of_faces: u32,
    pub number_of_mipmap_levels: u32,
}

impl KtxInfo {
    /// Whether the payload is block compressed (`glType` is zero).
    pub fn is_compressed(&self) -> bool {
        self.gl_type == 0
    }

    fn layers(&self) -> u32 {
        self.number_of_array_elements.max(1)
    }

    fn faces(&self) -> u32 {
        self.number_of_faces.max(1)
    }

    fn levels(&self) -> u32 {
        self.number_of_mipmap_levels.max(1)
    }
}

/// A parsed (or programmatically assembled) KTX file.
#[derive(Clone, Debug, PartialEq)]
pub struct KtxBundle {
    info: KtxInfo,
    metadata: BTreeMap<String, String>,
    // indexed by (level * layers + layer) * faces + face
    blobs: Vec<Vec<u8>>,
}

impl KtxBundle {
    /// An empty bundle; fill it with [`KtxBundle::set_blob`].
    pub fn new(info: KtxInfo) -> Self {
        let count = (info.levels() as usize)
            .saturating_mul(info.layers() as usize)
            .saturating_mul(info.faces() as usize);
        Self {
            info,
            metadata: BTreeMap::new(),
            blobs: vec![Vec::new(); count],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= HEADER_SIZE,
            "KTX data is {} bytes, shorter than its header",
            bytes.len()
        );
        ensure!(bytes[..12] == KTX_IDENTIFIER, "missing KTX identifier");

        let mut reader = Reader::new(bytes, 12);
        let endianness = reader.u32()?;
        if endianness != ENDIANNESS {
            bail!("unsupported KTX endianness marker {endianness:#010x}");
        }

        let info = KtxInfo {
            gl_type: reader.u32()?,
            gl_type_size: reader.u32()?,
            gl_format: reader.u32()?,
            gl_internal_format: reader.u32()?,
            gl_base_internal_format: reader.u32()?,
            pixel_width: reader.u32()?,
            pixel_height: reader.u32()?,
            pixel_depth: reader.u32()?,
            number_of_array_elements: reader.u32()?,
            number_of_faces: reader.u32()?,
            number_of_mipmap_levels: reader.u32()?,
        };
        ensure!(
            info.number_of_faces == 1 || info.number_of_faces == 6,
            "KTX face count must be 1 or 6, got {}",
            info.number_of_faces
        );
        ensure!(
            info.number_of_mipmap_levels <= MAX_MIP_LEVELS,
            "KTX mip level count {} exceeds {}",
            info.number_of_mipmap_levels,
            MAX_MIP_LEVELS
        );
        let kv_size = reader.u32()? as usize;
        let kv_end = reader
            .pos
            .checked_add(kv_size)
            .filter(|&end| end <= bytes.len())
            .context("KTX metadata runs past end of data")?;

        // A header naming more images than there are bytes left is corrupt.
        let count = (info.levels() as usize)
            .checked_mul(info.layers() as usize)
            .and_then(|n| n.checked_mul(info.faces() as usize))
            .context("KTX image count overflows")?;
        ensure!(
            count <= bytes.len() - kv_end,
            "KTX header names {} images but only {} bytes of image data follow",
            count,
            bytes.len() - kv_end
        );

        let mut bundle = Self::new(info);
        while reader.pos < kv_end {
            let entry_size = reader.u32()? as usize;
            let entry = reader.take(entry_size)?;
            reader.skip(padding(entry_size))?;
            let split = entry.iter().position(|&b| b == 0).unwrap_or(entry.len());
            let key = String::from_utf8_lossy(&entry[..split]).into_owned();
            let value = entry.get(split + 1..).unwrap_or_default();
            let value = value.strip_suffix(&[0]).unwrap_or(value);
            bundle
                .metadata
                .insert(key, String::from_utf8_lossy(value).into_owned());
        }
        reader.pos = kv_end;

        // Non-array cubemaps store imageSize per face and pad each face.
        let per_face_size = info.faces() == 6 && info.number_of_array_elements == 0;
        for level in 0..info.levels() {
            let image_size = reader.u32()? as usize;
            for layer in 0..info.layers() {
                for face in 0..info.faces() {
                    let size = if per_face_size {
                        image_size
                    } else {
                        image_size / (info.layers() as usize * info.faces() as usize)
                    };
                    let blob = reader.take(size)?.to_vec();
                    if per_face_size {
                        reader.skip(padding(size))?;
                    }
                    let index = bundle.index(level, layer, face);
                    bundle.blobs[index] = blob;
                }
            }
            if !per_face_size {
                reader.skip(padding(image_size))?;
            }
        }

        Ok(bundle)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&KTX_IDENTIFIER);
        let info = &self.info;
        for value in [
            ENDIANNESS,
            info.gl_type,
            info.gl_type_size,
            info.gl_format,
            info.gl_internal_format,
            info.gl_base_internal_format,
            info.pixel_width,
            info.pixel_height,
            info.pixel_depth,
            info.number_of_array_elements,
            info.number_of_faces,
            info.number_of_mipmap_levels,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }

        let mut kv = Vec::new();
        for (key, value) in &self.metadata {
            let size = key.len() + 1 + value.len() + 1;
            kv.extend_from_slice(&(size as u32).to_le_bytes());
            kv.extend_from_slice(key.as_bytes());
            kv.push(0);
            kv.extend_from_slice(value.as_bytes());
            kv.push(0);
            kv.resize(kv.len() + padding(size), 0);
        }
        out.extend_from_slice(&(kv.len() as u32).to_le_bytes());
        out.extend_from_slice(&kv);

        let per_face_size = info.faces() == 6 && info.number_of_array_elements == 0;
        for level in 0..info.levels() {
            let per_level = info.layers() as usize * info.faces() as usize;
            let start = level as usize * per_level;
            let end = start + per_level;
            let blobs = &self.blobs[start..end];
            if per_face_size {
                let face_size = blobs.first().map_or(0, Vec::len);
                out.extend_from_slice(&(face_size as u32).to_le_bytes());
                for blob in blobs {
                    out.extend_from_slice(blob);
                    out.resize(out.len() + padding(blob.len()), 0);
                }
            } else {
                let level_size: usize = blobs.iter().map(Vec::len).sum();
                out.extend_from_slice(&(level_size as u32).to_le_bytes());
                for blob in blobs {
                    out.extend_from_slice(blob);
                }
                out.resize(out.len() + padding(level_size), 0);
            }
        }
        out
    }

    pub fn info(&self) -> &KtxInfo {
        &self.info
    }

    /// Number of stored mip levels (at least one).
    pub fn num_mip_levels(&self) -> u32 {
        self.info.levels()
    }

    pub fn num_array_elements(&self) -> u32 {
        self.info.layers()
    }

    pub fn is_cubemap(&self) -> bool {
        self.info.number_of_faces == 6
    }

    pub fn blob(&self, level: u32, layer: u32, face: u32) -> Option<&[u8]> {
        if level >= self.info.levels() || layer >= self.info.layers() || face >= self.info.faces()
        {
            return None;
        }
        Some(&self.blobs[self.index(level, layer, face)])
    }

    /// The six faces of a cubemap level, concatenated in face order.
    pub fn cube_blob(&self, level: u32) -> Option<Vec<u8>> {
        if !self.is_cubemap() {
            return None;
        }
        let mut bytes = Vec::new();
        for face in 0..6 {
            bytes.extend_from_slice(self.blob(level, 0, face)?);
        }
        Some(bytes)
    }

    pub fn set_blob(&mut self, level: u32, layer: u32, face: u32, data: Vec<u8>) -> Result<()> {
        ensure!(
            level < self.info.levels() && layer < self.info.layers() && face < self.info.faces(),
            "blob [{level}, {layer}, {face}] is outside the bundle"
        );
        let index = self.index(level, layer, face);
        self.blobs[index] = data;
        Ok(())
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    fn index(&self, level: u32, layer: u32, face: u32) -> usize {
        let (layers, faces) = (self.info.layers() as usize, self.info.faces() as usize);
        (level as usize * layers + layer as usize) * faces + face as usize
    }
}

fn padding(size: usize) -> usize {
    (4 - size % 4) % 4
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.saturating_add(len);
        ensure!(
            end <= self.bytes.len(),
            "KTX data truncated: need {} bytes at offset {}, have {}",
            len,
            self.pos,
            self.bytes.len()
        );
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        // trailing padding after the last level is optional
        self.pos = self.pos.saturating_add(len).min(self.bytes.len());
        Ok(())
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb8_info(width: u32, height: u32, levels: u32, faces: u32) -> KtxInfo {
        KtxInfo {
            gl_type: gl::UNSIGNED_BYTE,
            gl_type_size: 1,
            gl_format: gl::RGB,
            gl_internal_format: gl::RGB8,
            gl_base_internal_format: gl::RGB,
            pixel_width: width,
            pixel_height: height,
            pixel_depth: 0,
            number_of_array_elements: 0,
            number_of_faces: faces,
            number_of_mipmap_levels: levels,
        }
    }

    #[test]
    fn reads_back_a_2d_bundle_with_metadata() {
        let mut bundle = KtxBundle::new(rgb8_info(2, 1, 2, 1));
        bundle.set_blob(0, 0, 0, vec![1, 2, 3, 4, 5, 6]).unwrap();
        bundle.set_blob(1, 0, 0, vec![7, 8, 9]).unwrap();
        bundle.set_metadata("sh", "0.1 0.2 0.3");
        bundle.set_metadata("KTXorientation", "S=r,T=d");

        let bytes = bundle.to_bytes();
        let parsed = KtxBundle::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.num_mip_levels(), 2);
        assert!(!parsed.is_cubemap());
        assert_eq!(parsed.blob(1, 0, 0), Some(&[7u8, 8, 9][..]));
        assert_eq!(parsed.metadata("sh"), Some("0.1 0.2 0.3"));
        assert_eq!(parsed.metadata("missing"), None);
        assert_eq!(parsed.info().gl_internal_format, gl::RGB8);
        assert!(parsed.cube_blob(0).is_none());
    }

    #[test]
    fn cubemap_faces_concatenate_in_order() {
        let mut bundle = KtxBundle::new(rgb8_info(1, 1, 1, 6));
        for face in 0..6u8 {
            bundle.set_blob(0, 0, face as u32, vec![face; 3]).unwrap();
        }
        let parsed = KtxBundle::from_bytes(&bundle.to_bytes()).unwrap();
        assert!(parsed.is_cubemap());
        let cube = parsed.cube_blob(0).unwrap();
        assert_eq!(cube.len(), 18);
        assert_eq!(&cube[15..], &[5, 5, 5]);
    }

    #[test]
    fn zero_mip_levels_means_one() {
        let bundle = KtxBundle::new(rgb8_info(1, 1, 0, 1));
        assert_eq!(bundle.num_mip_levels(), 1);
        assert!(bundle.blob(0, 0, 0).is_some());
        assert!(bundle.blob(1, 0, 0).is_none());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(KtxBundle::from_bytes(&[0; 10]).is_err());
        assert!(KtxBundle::from_bytes(&[0; 64]).is_err());

        let mut bundle = KtxBundle::new(rgb8_info(4, 4, 1, 1));
        bundle.set_blob(0, 0, 0, vec![0; 48]).unwrap();
        let bytes = bundle.to_bytes();
        assert!(KtxBundle::from_bytes(&bytes[..bytes.len() - 10]).is_err());

        let mut big_endian = bytes.clone();
        big_endian[12..16].copy_from_slice(&ENDIANNESS.to_be_bytes());
        assert!(KtxBundle::from_bytes(&big_endian).is_err());
    }

    fn with_header_field(bytes: &[u8], offset: usize, value: u32) -> Vec<u8> {
        let mut bytes = bytes.to_vec();
        bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        bytes
    }

    #[test]
    fn oversized_image_counts_are_rejected() {
        let mut bundle = KtxBundle::new(rgb8_info(1, 1, 1, 6));
        for face in 0..6 {
            bundle.set_blob(0, 0, face, vec![0; 3]).unwrap();
        }
        let bytes = bundle.to_bytes();
        // header words: levels at 56, array elements at 48
        let levels = 56;
        let layers = 48;

        assert!(KtxBundle::from_bytes(&with_header_field(&bytes, levels, 0x8000_0000)).is_err());
        assert!(KtxBundle::from_bytes(&with_header_field(&bytes, levels, u32::MAX)).is_err());
        assert!(KtxBundle::from_bytes(&with_header_field(&bytes, levels, 33)).is_err());
        assert!(KtxBundle::from_bytes(&with_header_field(&bytes, layers, u32::MAX)).is_err());
    }

    #[test]
    fn metadata_size_past_the_end_is_rejected() {
        let bundle = KtxBundle::new(rgb8_info(1, 1, 1, 1));
        let bytes = with_header_field(&bundle.to_bytes(), 60, u32::MAX);
        let err = KtxBundle::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("metadata"));
    }
}
