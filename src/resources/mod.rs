//! Loading of external assets and their conversion into engine objects.
//!
//! - `assets` reads named files (local directory or page origin)
//! - `ktx` parses and writes KTX1 containers
//! - `png` decodes PNG images
//! - `texture` turns KTX/PNG data into textures, indirect lights and skyboxes
//! - `mesh` turns OBJ meshes into vertex and index buffers

pub mod assets;
pub mod ktx;
pub mod mesh;
pub mod png;
pub mod texture;

pub use assets::{AssetSource, Assets};
pub use texture::{EngineExt, IblOptions, TextureOptions};
