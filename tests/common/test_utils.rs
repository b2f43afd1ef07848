use anyhow::{Result, ensure};
use flow_ngin_utils::{
    data_structures::{
        buffer::{BufferDescriptor, PixelBufferDescriptor, PixelLayout},
        light::IndirectLightDesc,
        mesh::{IndexType, VertexLayout},
        texture::TextureDesc,
    },
    engine::{Engine, SupportedFormats},
    resources::ktx::{KtxBundle, KtxInfo, gl},
};

/// Handle the recording engine gives out; the index into `textures`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateTexture(TextureDesc),
    SetImage {
        texture: TextureId,
        level: u32,
        layout: PixelLayout,
        bytes: Vec<u8>,
    },
    SetImageCube {
        texture: TextureId,
        level: u32,
        layout: PixelLayout,
        bytes: Vec<u8>,
    },
    CreateIndirectLight {
        reflections: Option<TextureId>,
        desc: IndirectLightDesc,
    },
    CreateSkybox {
        environment: TextureId,
    },
    CreateVertexBuffer {
        layout: VertexLayout,
        vertex_count: u32,
        bytes: Vec<u8>,
    },
    CreateIndexBuffer {
        index_type: IndexType,
        bytes: Vec<u8>,
    },
}

/// Engine double that records every builder call instead of touching a GPU.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub formats: SupportedFormats,
    pub textures: Vec<TextureDesc>,
    pub calls: Vec<Call>,
}

#[allow(dead_code)]
impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formats(formats: SupportedFormats) -> Self {
        Self {
            formats,
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::SetImage { .. } | Call::SetImageCube { .. }))
            .collect()
    }

    fn check_level(&self, texture: TextureId, level: u32) -> Result<&TextureDesc> {
        let desc = self
            .textures
            .get(texture.0)
            .ok_or_else(|| anyhow::anyhow!("unknown texture {:?}", texture))?;
        ensure!(level < desc.levels, "level {} out of range", level);
        Ok(desc)
    }
}

impl Engine for RecordingEngine {
    type Texture = TextureId;
    type IndirectLight = usize;
    type Skybox = usize;
    type VertexBuffer = usize;
    type IndexBuffer = usize;

    fn supported_formats(&self) -> SupportedFormats {
        self.formats
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        self.textures.push(*desc);
        self.calls.push(Call::CreateTexture(*desc));
        Ok(TextureId(self.textures.len() - 1))
    }

    fn set_image(
        &mut self,
        texture: &TextureId,
        level: u32,
        pixels: PixelBufferDescriptor,
    ) -> Result<()> {
        self.check_level(*texture, level)?;
        self.calls.push(Call::SetImage {
            texture: *texture,
            level,
            layout: pixels.layout(),
            bytes: pixels.into_bytes(),
        });
        Ok(())
    }

    fn set_image_cube(
        &mut self,
        texture: &TextureId,
        level: u32,
        pixels: PixelBufferDescriptor,
    ) -> Result<()> {
        self.check_level(*texture, level)?;
        self.calls.push(Call::SetImageCube {
            texture: *texture,
            level,
            layout: pixels.layout(),
            bytes: pixels.into_bytes(),
        });
        Ok(())
    }

    fn create_indirect_light(
        &mut self,
        reflections: Option<TextureId>,
        desc: &IndirectLightDesc,
    ) -> Result<usize> {
        self.calls.push(Call::CreateIndirectLight {
            reflections,
            desc: *desc,
        });
        Ok(self.calls.len() - 1)
    }

    fn create_skybox(&mut self, environment: TextureId) -> Result<usize> {
        self.calls.push(Call::CreateSkybox { environment });
        Ok(self.calls.len() - 1)
    }

    fn create_vertex_buffer(
        &mut self,
        layout: &VertexLayout,
        vertex_count: u32,
        data: BufferDescriptor,
    ) -> Result<usize> {
        self.calls.push(Call::CreateVertexBuffer {
            layout: layout.clone(),
            vertex_count,
            bytes: data.into_bytes(),
        });
        Ok(self.calls.len() - 1)
    }

    fn create_index_buffer(&mut self, index_type: IndexType, data: BufferDescriptor) -> Result<usize> {
        self.calls.push(Call::CreateIndexBuffer {
            index_type,
            bytes: data.into_bytes(),
        });
        Ok(self.calls.len() - 1)
    }
}

/// Uncompressed KTX with a full mip chain whose texels are the level index.
#[allow(dead_code)]
pub fn uncompressed_ktx(
    gl_internal_format: u32,
    gl_format: u32,
    gl_type: u32,
    bytes_per_pixel: usize,
    size: u32,
    faces: u32,
) -> KtxBundle {
    let levels = 32 - size.leading_zeros();
    let mut ktx = KtxBundle::new(KtxInfo {
        gl_type,
        gl_type_size: 1,
        gl_format,
        gl_internal_format,
        gl_base_internal_format: gl_format,
        pixel_width: size,
        pixel_height: size,
        pixel_depth: 0,
        number_of_array_elements: 0,
        number_of_faces: faces,
        number_of_mipmap_levels: levels,
    });
    for level in 0..levels {
        let side = (size >> level).max(1) as usize;
        for face in 0..faces {
            ktx.set_blob(level, 0, face, vec![level as u8; side * side * bytes_per_pixel])
                .unwrap();
        }
    }
    ktx
}

/// cmgen-style IBL: an R11F_G11F_B10F cubemap plus `sh` metadata.
#[allow(dead_code)]
pub fn ibl_ktx(size: u32) -> KtxBundle {
    let mut ktx = uncompressed_ktx(
        gl::R11F_G11F_B10F,
        gl::RGB,
        gl::UNSIGNED_INT_10F_11F_11F_REV,
        4,
        size,
        6,
    );
    let sh: Vec<String> = (0..9)
        .map(|i| format!("{0}.5 {0}.25 {0}.125", i))
        .collect();
    ktx.set_metadata("sh", sh.join("\n"));
    ktx
}

#[allow(dead_code)]
pub fn encode_png(img: &image::DynamicImage) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}
