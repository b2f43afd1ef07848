use anyhow::{Context as _, Result, bail, ensure};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        buffer::{BufferDescriptor, PixelBufferDescriptor, PixelDataFormat, PixelDataType, PixelLayout},
        light::{IndirectLightDesc, SH_COEFFICIENTS},
        mesh::{IndexType, VertexLayout},
        texture::{self, CUBE_FACE_COUNT, SamplerType, TextureDesc},
    },
    engine::{Engine, SupportedFormats},
    heap::Heap,
};

/// Knobs for creating a [`Context`].
#[derive(Clone, Debug)]
pub struct ContextOptions {
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
    /// Initial size of the shared heap in bytes.
    pub heap_capacity: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            heap_capacity: 64 * 1024,
        }
    }
}

/// Headless wgpu engine: the device and queue every resource is created on,
/// plus the heap scripts stage their arrays in.
#[derive(Debug)]
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub heap: Heap,
    features: wgpu::Features,
}

impl Context {
    pub async fn new(options: ContextOptions) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                compatible_surface: None,
                force_fallback_adapter: options.force_fallback_adapter,
            })
            .await
            .context("no suitable GPU adapter")?;

        // Ask for every compressed family the adapter has so KTX assets in
        // those formats can be sampled.
        let compression = wgpu::Features::TEXTURE_COMPRESSION_BC
            | wgpu::Features::TEXTURE_COMPRESSION_ETC2
            | wgpu::Features::TEXTURE_COMPRESSION_ASTC;
        let features = adapter.features() & compression;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("flow-ngin-utils device"),
                required_features: features,
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                ..Default::default()
            })
            .await
            .context("failed to create GPU device")?;

        log::info!(
            "Created wgpu context on {:?} with features {:?}",
            adapter.get_info().backend,
            features
        );
        Ok(Self::from_parts(
            device,
            queue,
            features,
            Heap::with_capacity(options.heap_capacity),
        ))
    }

    /// Wrap an existing device, for hosts that already own one.
    pub fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        features: wgpu::Features,
        heap: Heap,
    ) -> Self {
        Self {
            device,
            queue,
            heap,
            features,
        }
    }

    pub fn features(&self) -> wgpu::Features {
        self.features
    }
}

/// Indirect light resources: optional reflections cubemap plus an SH uniform.
#[derive(Clone, Debug)]
pub struct GpuIndirectLight {
    pub reflections: Option<texture::Texture>,
    pub irradiance: wgpu::Buffer,
    pub desc: IndirectLightDesc,
}

#[derive(Clone, Debug)]
pub struct GpuSkybox {
    pub environment: texture::Texture,
}

#[derive(Clone, Debug)]
pub struct GpuVertexBuffer {
    pub buffer: wgpu::Buffer,
    pub layout: VertexLayout,
    pub vertex_count: u32,
}

#[derive(Clone, Debug)]
pub struct GpuIndexBuffer {
    pub buffer: wgpu::Buffer,
    pub format: wgpu::IndexFormat,
    pub index_count: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct IrradianceUniform {
    sh: [[f32; 4]; SH_COEFFICIENTS],
    intensity: f32,
    bands: u32,
    _padding: [u32; 2],
}

impl Engine for Context {
    type Texture = texture::Texture;
    type IndirectLight = GpuIndirectLight;
    type Skybox = GpuSkybox;
    type VertexBuffer = GpuVertexBuffer;
    type IndexBuffer = GpuIndexBuffer;

    fn supported_formats(&self) -> SupportedFormats {
        SupportedFormats {
            s3tc: self.features.contains(wgpu::Features::TEXTURE_COMPRESSION_BC),
            astc: self.features.contains(wgpu::Features::TEXTURE_COMPRESSION_ASTC),
            etc: self.features.contains(wgpu::Features::TEXTURE_COMPRESSION_ETC2),
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture> {
        let required = desc.format.required_features();
        ensure!(
            self.features.contains(required),
            "{:?} textures need device features {:?}",
            desc.format,
            required
        );
        Ok(texture::Texture::new(&self.device, desc, Some("flow-ngin-utils texture")))
    }

    fn set_image(
        &mut self,
        texture: &Self::Texture,
        level: u32,
        pixels: PixelBufferDescriptor,
    ) -> Result<()> {
        ensure!(
            texture.desc.sampler == SamplerType::Sampler2d,
            "set_image on a cubemap, use set_image_cube"
        );
        let texels = prepare_texels(&texture.desc, pixels)?;
        texture.write_level(&self.queue, level, 0, &texels)
    }

    fn set_image_cube(
        &mut self,
        texture: &Self::Texture,
        level: u32,
        pixels: PixelBufferDescriptor,
    ) -> Result<()> {
        ensure!(
            texture.desc.sampler == SamplerType::SamplerCubemap,
            "set_image_cube on a 2D texture"
        );
        let texels = prepare_texels(&texture.desc, pixels)?;
        ensure!(
            texels.len() % CUBE_FACE_COUNT as usize == 0,
            "cubemap level of {} bytes does not split into {} faces",
            texels.len(),
            CUBE_FACE_COUNT
        );
        let face_size = texels.len() / CUBE_FACE_COUNT as usize;
        for (face, bytes) in texels.chunks_exact(face_size).enumerate() {
            texture.write_level(&self.queue, level, face as u32, bytes)?;
        }
        Ok(())
    }

    fn create_indirect_light(
        &mut self,
        reflections: Option<Self::Texture>,
        desc: &IndirectLightDesc,
    ) -> Result<Self::IndirectLight> {
        if let Some(reflections) = &reflections {
            ensure!(
                reflections.desc.sampler == SamplerType::SamplerCubemap,
                "indirect light reflections must be a cubemap"
            );
        }
        let uniform = IrradianceUniform {
            sh: desc.irradiance.to_uniform(),
            intensity: desc.intensity,
            bands: desc.irradiance.bands as u32,
            _padding: [0; 2],
        };
        let irradiance = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Irradiance Buffer"),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        Ok(GpuIndirectLight {
            reflections,
            irradiance,
            desc: *desc,
        })
    }

    fn create_skybox(&mut self, environment: Self::Texture) -> Result<Self::Skybox> {
        ensure!(
            environment.desc.sampler == SamplerType::SamplerCubemap,
            "skybox environment must be a cubemap"
        );
        Ok(GpuSkybox { environment })
    }

    fn create_vertex_buffer(
        &mut self,
        layout: &VertexLayout,
        vertex_count: u32,
        data: BufferDescriptor,
    ) -> Result<Self::VertexBuffer> {
        let expected = layout.stride as usize * vertex_count as usize;
        ensure!(
            data.len() == expected,
            "{} vertices of stride {} need {} bytes, got {}",
            vertex_count,
            layout.stride,
            expected,
            data.len()
        );
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: data.bytes(),
                usage: wgpu::BufferUsages::VERTEX,
            });
        Ok(GpuVertexBuffer {
            buffer,
            layout: layout.clone(),
            vertex_count,
        })
    }

    fn create_index_buffer(
        &mut self,
        index_type: IndexType,
        data: BufferDescriptor,
    ) -> Result<Self::IndexBuffer> {
        ensure!(
            data.len() % index_type.size() == 0,
            "index data of {} bytes is not a whole number of {:?} indices",
            data.len(),
            index_type
        );
        let index_count = (data.len() / index_type.size()) as u32;
        // wgpu requires buffer sizes aligned to COPY_BUFFER_ALIGNMENT.
        let mut contents = data.into_bytes();
        contents.resize(
            contents.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize),
            0,
        );
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: &contents,
                usage: wgpu::BufferUsages::INDEX,
            });
        Ok(GpuIndexBuffer {
            buffer,
            format: index_type.to_wgpu(),
            index_count,
        })
    }
}

/// Check that a pixel buffer matches the texture and return the bytes wgpu
/// should receive.
pub(crate) fn prepare_texels(desc: &TextureDesc, pixels: PixelBufferDescriptor) -> Result<Vec<u8>> {
    match pixels.layout() {
        PixelLayout::Compressed { datatype, .. } => {
            ensure!(
                desc.format.compressed_type() == Some(datatype),
                "{:?} data cannot fill a {:?} texture",
                datatype,
                desc.format
            );
            Ok(pixels.into_bytes())
        }
        PixelLayout::Uncompressed { format, datatype } => {
            ensure!(
                !desc.format.is_compressed(),
                "uncompressed data cannot fill a {:?} texture",
                desc.format
            );
            if desc.format.is_rgb() && format == PixelDataFormat::Rgb {
                widen_rgb_to_rgba(pixels.bytes(), datatype)
            } else {
                Ok(pixels.into_bytes())
            }
        }
    }
}

/// Append an opaque alpha channel to tightly packed RGB texels.
pub(crate) fn widen_rgb_to_rgba(bytes: &[u8], datatype: PixelDataType) -> Result<Vec<u8>> {
    let alpha: &[u8] = match datatype {
        PixelDataType::UByte => &[0xff],
        PixelDataType::UShort => &[0xff, 0xff],
        PixelDataType::Half => &[0x00, 0x3c],
        PixelDataType::Float => &[0x00, 0x00, 0x80, 0x3f],
        other => bail!("{:?} RGB data cannot be widened to RGBA", other),
    };
    let texel = alpha.len() * 3;
    ensure!(
        bytes.len() % texel == 0,
        "RGB data of {} bytes is not a whole number of {} byte texels",
        bytes.len(),
        texel
    );
    let mut out = Vec::with_capacity(bytes.len() / 3 * 4);
    for rgb in bytes.chunks_exact(texel) {
        out.extend_from_slice(rgb);
        out.extend_from_slice(alpha);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::buffer::CompressedPixelDataType;
    use crate::data_structures::texture::{InternalFormat, TextureBuilder};

    #[test]
    fn widening_appends_opaque_alpha() {
        let out = widen_rgb_to_rgba(&[1, 2, 3, 4, 5, 6], PixelDataType::UByte).unwrap();
        assert_eq!(out, vec![1, 2, 3, 255, 4, 5, 6, 255]);

        let halves = widen_rgb_to_rgba(&[0; 6], PixelDataType::Half).unwrap();
        assert_eq!(half::f16::from_le_bytes([halves[6], halves[7]]).to_f32(), 1.0);

        let float = widen_rgb_to_rgba(&[0; 12], PixelDataType::Float).unwrap();
        assert_eq!(f32::from_le_bytes([float[12], float[13], float[14], float[15]]), 1.0);
    }

    #[test]
    fn widening_rejects_partial_texels() {
        assert!(widen_rgb_to_rgba(&[1, 2], PixelDataType::UByte).is_err());
        assert!(widen_rgb_to_rgba(&[0; 4], PixelDataType::UInt10F11F11FRev).is_err());
    }

    #[test]
    fn compressed_data_must_match_texture_format() {
        let desc = TextureBuilder::new()
            .width(4)
            .height(4)
            .format(InternalFormat::Dxt1Rgb)
            .desc()
            .unwrap();
        let matching =
            PixelBufferDescriptor::compressed(&[0; 8], CompressedPixelDataType::Dxt1Rgb, None)
                .unwrap();
        assert_eq!(prepare_texels(&desc, matching).unwrap().len(), 8);

        let other =
            PixelBufferDescriptor::compressed(&[0; 16], CompressedPixelDataType::Dxt5Rgba, None)
                .unwrap();
        assert!(prepare_texels(&desc, other).is_err());
    }

    #[test]
    fn rgba_data_passes_through() {
        let desc = TextureBuilder::new().width(1).height(1).desc().unwrap();
        let pixels =
            PixelBufferDescriptor::new(&[9, 8, 7, 6], PixelDataFormat::Rgba, PixelDataType::UByte)
                .unwrap();
        assert_eq!(prepare_texels(&desc, pixels).unwrap(), vec![9, 8, 7, 6]);
    }
}
