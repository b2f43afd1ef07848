mod common;

use common::test_utils::{Call, RecordingEngine, TextureId, encode_png, ibl_ktx, uncompressed_ktx};
use flow_ngin_utils::{
    EngineExt, IblOptions, TextureOptions,
    data_structures::{
        buffer::{CompressedPixelDataType, PixelDataFormat, PixelDataType, PixelLayout},
        light::DEFAULT_IBL_INTENSITY,
        texture::{InternalFormat, SamplerType},
    },
    resources::{
        ktx::{KtxBundle, KtxInfo, gl},
        texture::{create_ibl_from_ktx_bundle, create_sky_from_ktx_bundle, create_texture_from_ktx_bundle},
    },
};
use image::{DynamicImage, Rgba, RgbaImage};

#[test]
fn ktx_2d_uploads_every_level() {
    let ktx = uncompressed_ktx(gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE, 4, 8, 1);
    let mut engine = RecordingEngine::new();

    let texture = engine
        .create_texture_from_ktx(&ktx.to_bytes(), &TextureOptions::default())
        .unwrap()
        .unwrap();

    let desc = engine.textures[texture.0];
    assert_eq!(desc.format, InternalFormat::Rgba8);
    assert_eq!(desc.sampler, SamplerType::Sampler2d);
    assert_eq!(desc.levels, 4);

    let uploads = engine.uploads();
    assert_eq!(uploads.len(), 4);
    match uploads[2] {
        Call::SetImage {
            level,
            layout,
            bytes,
            ..
        } => {
            assert_eq!(*level, 2);
            assert_eq!(
                *layout,
                PixelLayout::Uncompressed {
                    format: PixelDataFormat::Rgba,
                    datatype: PixelDataType::UByte,
                }
            );
            assert_eq!(bytes.len(), 2 * 2 * 4);
            assert!(bytes.iter().all(|&b| b == 2));
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[test]
fn srgb_option_promotes_8bit_formats() {
    let ktx = uncompressed_ktx(gl::RGB8, gl::RGB, gl::UNSIGNED_BYTE, 3, 4, 1);
    let mut engine = RecordingEngine::new();
    let options = TextureOptions {
        srgb: true,
        ..Default::default()
    };

    let texture = create_texture_from_ktx_bundle(&mut engine, &ktx, &options)
        .unwrap()
        .unwrap();
    assert_eq!(engine.textures[texture.0].format, InternalFormat::Srgb8);
}

#[test]
fn rgbm_forces_rgba8() {
    let ktx = uncompressed_ktx(gl::SRGB8_ALPHA8, gl::RGBA, gl::UNSIGNED_BYTE, 4, 4, 1);
    let mut engine = RecordingEngine::new();
    let options = TextureOptions {
        rgbm: true,
        srgb: true,
        ..Default::default()
    };

    let texture = create_texture_from_ktx_bundle(&mut engine, &ktx, &options)
        .unwrap()
        .unwrap();
    let desc = engine.textures[texture.0];
    assert_eq!(desc.format, InternalFormat::Rgba8);
    assert!(desc.rgbm);
}

#[test]
fn rgbm_on_wider_pixels_yields_none() {
    let mut engine = RecordingEngine::new();
    let options = TextureOptions {
        rgbm: true,
        ..Default::default()
    };

    let half = uncompressed_ktx(gl::RGBA16F, gl::RGBA, gl::HALF_FLOAT, 8, 4, 1);
    assert!(create_texture_from_ktx_bundle(&mut engine, &half, &options).unwrap().is_none());
    let rgb = uncompressed_ktx(gl::RGB8, gl::RGB, gl::UNSIGNED_BYTE, 3, 4, 1);
    assert!(create_texture_from_ktx_bundle(&mut engine, &rgb, &options).unwrap().is_none());
    assert!(engine.calls.is_empty());
}

#[test]
fn unsupported_format_yields_none() {
    let ktx = uncompressed_ktx(0x1234, gl::RGBA, gl::UNSIGNED_BYTE, 4, 4, 1);
    let mut engine = RecordingEngine::new();

    let texture = create_texture_from_ktx_bundle(&mut engine, &ktx, &TextureOptions::default()).unwrap();
    assert!(texture.is_none());
    assert!(engine.calls.is_empty());
}

#[test]
fn malformed_ktx_is_an_error() {
    let mut engine = RecordingEngine::new();
    assert!(
        engine
            .create_texture_from_ktx(b"definitely not ktx", &TextureOptions::default())
            .is_err()
    );
}

#[test]
fn compressed_ktx_uses_compressed_buffers() {
    let mut ktx = KtxBundle::new(KtxInfo {
        gl_type: 0,
        gl_type_size: 1,
        gl_format: 0,
        gl_internal_format: gl::COMPRESSED_RGBA_S3TC_DXT5,
        gl_base_internal_format: gl::RGBA,
        pixel_width: 4,
        pixel_height: 4,
        pixel_depth: 0,
        number_of_array_elements: 0,
        number_of_faces: 1,
        number_of_mipmap_levels: 1,
    });
    ktx.set_blob(0, 0, 0, vec![7; 16]).unwrap();
    let mut engine = RecordingEngine::new();

    create_texture_from_ktx_bundle(&mut engine, &ktx, &TextureOptions::default())
        .unwrap()
        .unwrap();
    match engine.uploads()[0] {
        Call::SetImage { layout, .. } => assert_eq!(
            *layout,
            PixelLayout::Compressed {
                datatype: CompressedPixelDataType::Dxt5Rgba,
                face_size: 16,
            }
        ),
        other => panic!("unexpected call {other:?}"),
    }
}

#[test]
fn cubemap_levels_are_uploaded_as_six_faces() {
    let ktx = uncompressed_ktx(gl::RGBA16F, gl::RGBA, gl::HALF_FLOAT, 8, 4, 6);
    let mut engine = RecordingEngine::new();

    let texture = create_texture_from_ktx_bundle(&mut engine, &ktx, &TextureOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(engine.textures[texture.0].sampler, SamplerType::SamplerCubemap);

    let uploads = engine.uploads();
    assert_eq!(uploads.len(), 3);
    match uploads[0] {
        Call::SetImageCube { level, bytes, .. } => {
            assert_eq!(*level, 0);
            assert_eq!(bytes.len(), 6 * 4 * 4 * 8);
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[test]
fn ibl_carries_reflections_and_irradiance() {
    let ktx = ibl_ktx(4);
    let mut engine = RecordingEngine::new();

    create_ibl_from_ktx_bundle(&mut engine, &ktx, &IblOptions::default())
        .unwrap()
        .unwrap();

    let light = engine
        .calls
        .iter()
        .find_map(|c| match c {
            Call::CreateIndirectLight { reflections, desc } => Some((*reflections, *desc)),
            _ => None,
        })
        .unwrap();
    assert_eq!(light.0, Some(TextureId(0)));
    assert_eq!(light.1.intensity, DEFAULT_IBL_INTENSITY);
    assert_eq!(light.1.irradiance.bands, 3);
    assert_eq!(light.1.irradiance.coefficients[0], [0.5, 0.25, 0.125]);
    assert_eq!(light.1.irradiance.coefficients[8], [8.5, 8.25, 8.125]);
}

#[test]
fn ibl_without_sh_metadata_fails() {
    let ktx = uncompressed_ktx(gl::RGB16F, gl::RGB, gl::HALF_FLOAT, 6, 4, 6);
    let mut engine = RecordingEngine::new();

    let err = engine
        .create_ibl_from_ktx(&ktx.to_bytes(), &IblOptions::default())
        .unwrap_err();
    assert!(format!("{err:#}").contains("sh"));
}

#[test]
fn skybox_needs_a_cubemap() {
    let mut engine = RecordingEngine::new();
    let cube = uncompressed_ktx(gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE, 4, 2, 6);
    create_sky_from_ktx_bundle(&mut engine, &cube, &TextureOptions::default())
        .unwrap()
        .unwrap();
    assert!(
        engine
            .calls
            .iter()
            .any(|c| matches!(c, Call::CreateSkybox { environment } if *environment == TextureId(0)))
    );

    let flat = uncompressed_ktx(gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE, 4, 2, 1);
    assert!(create_sky_from_ktx_bundle(&mut engine, &flat, &TextureOptions::default()).is_err());
}

fn checker_png(size: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(size, size, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    });
    encode_png(&DynamicImage::ImageRgba8(img))
}

#[test]
fn png_gets_a_full_mip_chain() {
    let mut engine = RecordingEngine::new();
    let texture = engine
        .create_texture_from_png(&checker_png(8), &TextureOptions::default())
        .unwrap();

    let desc = engine.textures[texture.0];
    assert_eq!(desc.format, InternalFormat::Rgba8);
    assert_eq!(desc.levels, 4);

    let sizes: Vec<usize> = engine
        .uploads()
        .iter()
        .map(|c| match c {
            Call::SetImage { bytes, .. } => bytes.len(),
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    assert_eq!(sizes, vec![8 * 8 * 4, 4 * 4 * 4, 2 * 2 * 4, 4]);
}

#[test]
fn png_options_select_format_and_levels() {
    let mut engine = RecordingEngine::new();
    let options = TextureOptions {
        srgb: true,
        noalpha: true,
        nomips: true,
        ..Default::default()
    };
    let texture = engine.create_texture_from_png(&checker_png(4), &options).unwrap();

    let desc = engine.textures[texture.0];
    assert_eq!(desc.format, InternalFormat::Srgb8);
    assert_eq!(desc.levels, 1);
    match engine.uploads()[0] {
        Call::SetImage { layout, bytes, .. } => {
            assert_eq!(
                *layout,
                PixelLayout::Uncompressed {
                    format: PixelDataFormat::Rgb,
                    datatype: PixelDataType::UByte,
                }
            );
            assert_eq!(bytes.len(), 4 * 4 * 3);
        }
        other => panic!("unexpected call {other:?}"),
    }
}
