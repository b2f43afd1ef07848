//! The seam between these helpers and the rendering engine.
//!
//! Everything in this crate reaches the engine through [`Engine`]. The
//! production implementation is [`Context`](crate::context::Context), which
//! creates wgpu resources. Other engines (or test doubles) only have to
//! provide the handful of builder calls below.

use anyhow::Result;

use crate::data_structures::{
    buffer::{BufferDescriptor, PixelBufferDescriptor},
    light::IndirectLightDesc,
    mesh::{IndexType, VertexLayout},
    texture::TextureDesc,
};

/// Compressed texture families the engine can sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SupportedFormats {
    pub s3tc: bool,
    pub astc: bool,
    pub etc: bool,
}

impl SupportedFormats {
    /// Formats in the order callers probe them.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> {
        [("s3tc", self.s3tc), ("astc", self.astc), ("etc", self.etc)].into_iter()
    }
}

/// Choose an asset file suffix for the first supported compressed format.
///
/// `desired` is a space-separated list of format names (`"etc s3tc"`). The
/// result is `"_s3tc"`, `"_astc"` or `"_etc"`, or an empty string when none of
/// the desired formats is supported and the uncompressed asset should be
/// used.
pub fn supported_format_suffix(supported: &SupportedFormats, desired: &str) -> String {
    let desired: Vec<&str> = desired.split_whitespace().collect();
    supported
        .iter()
        .find(|(name, available)| *available && desired.contains(name))
        .map(|(name, _)| format!("_{name}"))
        .unwrap_or_default()
}

pub trait Engine {
    type Texture;
    type IndirectLight;
    type Skybox;
    type VertexBuffer;
    type IndexBuffer;

    fn supported_formats(&self) -> SupportedFormats;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture>;

    /// Upload one mip level of a 2D texture.
    fn set_image(
        &mut self,
        texture: &Self::Texture,
        level: u32,
        pixels: PixelBufferDescriptor,
    ) -> Result<()>;

    /// Upload one mip level of a cubemap. `pixels` holds the six faces back
    /// to back in +X, -X, +Y, -Y, +Z, -Z order.
    fn set_image_cube(
        &mut self,
        texture: &Self::Texture,
        level: u32,
        pixels: PixelBufferDescriptor,
    ) -> Result<()>;

    fn create_indirect_light(
        &mut self,
        reflections: Option<Self::Texture>,
        desc: &IndirectLightDesc,
    ) -> Result<Self::IndirectLight>;

    fn create_skybox(&mut self, environment: Self::Texture) -> Result<Self::Skybox>;

    fn create_vertex_buffer(
        &mut self,
        layout: &VertexLayout,
        vertex_count: u32,
        data: BufferDescriptor,
    ) -> Result<Self::VertexBuffer>;

    fn create_index_buffer(
        &mut self,
        index_type: IndexType,
        data: BufferDescriptor,
    ) -> Result<Self::IndexBuffer>;
}
