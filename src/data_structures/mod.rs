//! Engine-facing data: buffers, textures, lights, meshes and generated geometry.
//!
//! - `buffer` holds owned vertex/index/pixel buffer descriptors
//! - `icosphere` generates a subdivided unit sphere
//! - `light` builds indirect lights and skyboxes
//! - `mesh` describes vertex layouts and the material registry
//! - `orientation` computes packed per-vertex tangent frames
//! - `texture` describes textures and wraps the wgpu objects

pub mod buffer;
pub mod icosphere;
pub mod light;
pub mod mesh;
pub mod orientation;
pub mod texture;
