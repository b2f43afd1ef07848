//! flow-ngin-utils
//!
//! Convenience helpers that sit between scripts (or plain Rust callers) and a
//! rendering engine. They marshal typed arrays into owned GPU buffers, pack
//! vertex attributes into compact formats, generate icospheres and turn KTX
//! and PNG assets into textures, indirect lights and skyboxes.
//!
//! High-level modules
//! - `context`: headless wgpu engine that owns device, queue and heap
//! - `data_structures`: buffers, textures, lights, meshes and icospheres
//! - `engine`: the `Engine` trait every helper builds on
//! - `heap`: byte arena scripts stage their arrays in
//! - `packing`: snorm16, half float and tangent frame packing
//! - `resources`: asset loading and KTX/PNG/OBJ conversion
//! - `web`: wasm-bindgen surface (wasm32 only)
//!

pub mod context;
pub mod data_structures;
pub mod engine;
pub mod heap;
pub mod packing;
pub mod resources;
#[cfg(target_arch = "wasm32")]
pub mod web;

// Re-exports commonly used types for convenience in downstream code.
pub use context::{Context, ContextOptions};
pub use data_structures::buffer::{BufferDescriptor, PixelBufferDescriptor};
pub use data_structures::icosphere::IcoSphere;
pub use engine::{Engine, SupportedFormats, supported_format_suffix};
pub use heap::{Heap, HeapRegion};
pub use resources::{AssetSource, Assets, EngineExt, IblOptions, TextureOptions};

/// Install the platform logger: `env_logger` natively (filtered by
/// `RUST_LOG`), the browser console on wasm.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            log::debug!("Logger already initialised: {}", e);
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::debug!("Logger already initialised: {}", e);
        }
    }
}
