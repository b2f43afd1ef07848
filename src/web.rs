//! Script bindings for the pure helpers.

use wasm_bindgen::prelude::*;

use crate::{
    data_structures::icosphere,
    packing,
    resources::{assets::AssetSource, png},
};

fn js_error(e: anyhow::Error) -> JsError {
    JsError::new(&format!("{e:#}"))
}

#[wasm_bindgen(start)]
pub fn start() {
    crate::init_logging();
}

#[wasm_bindgen(js_name = IcoSphere)]
pub struct WebIcoSphere {
    inner: icosphere::IcoSphere,
}

#[wasm_bindgen(js_class = IcoSphere)]
impl WebIcoSphere {
    #[wasm_bindgen(constructor)]
    pub fn new(subdivisions: u32) -> Result<WebIcoSphere, JsError> {
        let inner = icosphere::IcoSphere::new(subdivisions).map_err(js_error)?;
        Ok(Self { inner })
    }

    pub fn subdivide(&mut self) -> Result<(), JsError> {
        self.inner.subdivide().map_err(js_error)
    }

    #[wasm_bindgen(getter)]
    pub fn vertices(&self) -> Vec<f32> {
        self.inner.vertices().to_vec()
    }

    #[wasm_bindgen(getter)]
    pub fn tangents(&self) -> Vec<i16> {
        self.inner.tangents().to_vec()
    }

    #[wasm_bindgen(getter)]
    pub fn triangles(&self) -> Vec<u16> {
        self.inner.triangles().to_vec()
    }
}

#[wasm_bindgen(js_name = packSnorm16)]
pub fn pack_snorm16(value: f32) -> i16 {
    packing::pack_snorm16(value)
}

#[wasm_bindgen(js_name = packHalf)]
pub fn pack_half(value: f32) -> u16 {
    packing::pack_half(value)
}

#[wasm_bindgen(js_name = DecodedPng)]
pub struct WebDecodedPng {
    #[wasm_bindgen(readonly)]
    pub width: u32,
    #[wasm_bindgen(readonly)]
    pub height: u32,
    data: Vec<u8>,
}

#[wasm_bindgen(js_class = DecodedPng)]
impl WebDecodedPng {
    #[wasm_bindgen(getter)]
    pub fn data(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// Decode PNG bytes to RGB (`"rgb"`) or RGBA (anything else) pixels.
#[wasm_bindgen(js_name = decodePng)]
pub fn decode_png(bytes: &[u8], format: &str) -> Result<WebDecodedPng, JsError> {
    let channels = if format.eq_ignore_ascii_case("rgb") { 3 } else { 4 };
    let decoded = png::decode_png(bytes, channels).map_err(js_error)?;
    Ok(WebDecodedPng {
        width: decoded.width,
        height: decoded.height,
        data: decoded.data,
    })
}

/// Fetch an asset relative to the page origin.
#[wasm_bindgen(js_name = loadAsset)]
pub async fn load_asset(name: String) -> Result<Vec<u8>, JsError> {
    AssetSource::default()
        .load_binary(&name)
        .await
        .map_err(js_error)
}
