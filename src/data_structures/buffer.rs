//! Owned byte buffers handed to the engine.
//!
//! The engine consumes descriptors asynchronously, so a descriptor always owns
//! its bytes. Sources that live in the engine's own [`Heap`] are copied out
//! immediately: the heap may grow (and move) before the engine reads the data.

use anyhow::{Result, ensure};
use bytemuck::Pod;

use crate::heap::{Heap, HeapRegion};

/// Raw bytes for a vertex or index buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferDescriptor {
    bytes: Vec<u8>,
}

impl BufferDescriptor {
    /// Copy a typed array into a new descriptor.
    pub fn from_slice<T: Pod>(data: &[T]) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        ensure!(!bytes.is_empty(), "buffer descriptors need a non-empty array");
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Take ownership of already-owned bytes without copying.
    pub fn from_vec(bytes: Vec<u8>) -> Result<Self> {
        ensure!(!bytes.is_empty(), "buffer descriptors need a non-empty array");
        Ok(Self { bytes })
    }

    /// Copy a region of the engine heap into a new descriptor.
    pub fn from_heap(heap: &Heap, region: HeapRegion) -> Result<Self> {
        ensure!(region.len > 0, "buffer descriptors need a non-empty array");
        Ok(Self {
            bytes: heap.bytes(region)?.to_vec(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Channel layout of uncompressed pixel data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelDataFormat {
    R,
    Rg,
    Rgb,
    Rgba,
}

impl PixelDataFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::R => 1,
            Self::Rg => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Component type of uncompressed pixel data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelDataType {
    UByte,
    UShort,
    Half,
    Float,
    /// Packed R11F_G11F_B10F, one u32 per pixel.
    UInt10F11F11FRev,
    /// Packed RGB9_E5, one u32 per pixel.
    UInt5999Rev,
}

impl PixelDataType {
    /// Bytes per pixel for this type in the given layout.
    pub fn bytes_per_pixel(self, format: PixelDataFormat) -> usize {
        match self {
            Self::UByte => format.channels(),
            Self::UShort | Self::Half => 2 * format.channels(),
            Self::Float => 4 * format.channels(),
            Self::UInt10F11F11FRev | Self::UInt5999Rev => 4,
        }
    }
}

/// Block-compressed payload types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompressedPixelDataType {
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

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Uncompressed {
        format: PixelDataFormat,
        datatype: PixelDataType,
    },
    Compressed {
        datatype: CompressedPixelDataType,
        /// Size of one cube face (or of the whole image for 2D uploads).
        face_size: usize,
    },
}

/// Pixel bytes plus the description the engine needs to interpret them.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBufferDescriptor {
    bytes: Vec<u8>,
    layout: PixelLayout,
}

impl PixelBufferDescriptor {
    pub fn new(bytes: &[u8], format: PixelDataFormat, datatype: PixelDataType) -> Result<Self> {
        Self::from_vec(bytes.to_vec(), format, datatype)
    }

    pub fn from_vec(
        bytes: Vec<u8>,
        format: PixelDataFormat,
        datatype: PixelDataType,
    ) -> Result<Self> {
        ensure!(!bytes.is_empty(), "pixel buffers need a non-empty array");
        Ok(Self {
            bytes,
            layout: PixelLayout::Uncompressed { format, datatype },
        })
    }

    /// A compressed payload. `face_size` defaults to the whole byte length.
    pub fn compressed(
        bytes: &[u8],
        datatype: CompressedPixelDataType,
        face_size: Option<usize>,
    ) -> Result<Self> {
        ensure!(!bytes.is_empty(), "pixel buffers need a non-empty array");
        let face_size = face_size.unwrap_or(bytes.len());
        ensure!(
            face_size > 0 && bytes.len() % face_size == 0,
            "compressed payload of {} bytes is not a whole number of {} byte faces",
            bytes.len(),
            face_size
        );
        Ok(Self {
            bytes: bytes.to_vec(),
            layout: PixelLayout::Compressed {
                datatype,
                face_size,
            },
        })
    }

    pub fn from_heap(
        heap: &Heap,
        region: HeapRegion,
        format: PixelDataFormat,
        datatype: PixelDataType,
    ) -> Result<Self> {
        Self::new(heap.bytes(region)?, format, datatype)
    }

    pub fn compressed_from_heap(
        heap: &Heap,
        region: HeapRegion,
        datatype: CompressedPixelDataType,
        face_size: Option<usize>,
    ) -> Result<Self> {
        Self::compressed(heap.bytes(region)?, datatype, face_size)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
