//! Vertex layouts and the material registry used by the mesh loader.

use std::collections::HashMap;

/// Name under which the fallback material is registered.
pub const DEFAULT_MATERIAL: &str = "DefaultMaterial";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    Position,
    Tangents,
    Color,
    Uv0,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub semantic: VertexSemantic,
    pub format: wgpu::VertexFormat,
    pub offset: u64,
}

/// Interleaved layout of a single vertex buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Attributes with shader locations in declaration order.
    pub fn wgpu_attributes(&self) -> Vec<wgpu::VertexAttribute> {
        self.attributes
            .iter()
            .enumerate()
            .map(|(location, a)| wgpu::VertexAttribute {
                format: a.format,
                offset: a.offset,
                shader_location: location as u32,
            })
            .collect()
    }

    pub fn attribute(&self, semantic: VertexSemantic) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexType {
    UShort,
    UInt,
}

impl IndexType {
    pub fn size(self) -> usize {
        match self {
            Self::UShort => 2,
            Self::UInt => 4,
        }
    }

    pub fn to_wgpu(self) -> wgpu::IndexFormat {
        match self {
            Self::UShort => wgpu::IndexFormat::Uint16,
            Self::UInt => wgpu::IndexFormat::Uint32,
        }
    }
}

/// Vertex written by the mesh loader: position, packed tangent frame, uv.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub tangents: [i16; 4],
    pub uv0: [f32; 2],
}

impl MeshVertex {
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<MeshVertex>() as u64,
            attributes: vec![
                VertexAttribute {
                    semantic: VertexSemantic::Position,
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                },
                VertexAttribute {
                    semantic: VertexSemantic::Tangents,
                    format: wgpu::VertexFormat::Snorm16x4,
                    offset: std::mem::size_of::<[f32; 3]>() as u64,
                },
                VertexAttribute {
                    semantic: VertexSemantic::Uv0,
                    format: wgpu::VertexFormat::Float32x2,
                    offset: (std::mem::size_of::<[f32; 3]>() + std::mem::size_of::<[i16; 4]>())
                        as u64,
                },
            ],
        }
    }
}

/// Material instances keyed by the material name a mesh refers to.
///
/// Callers seed it with the materials they want to override; loading a mesh
/// fills in every other name with the default material, so afterwards the
/// registry lists each material the mesh uses.
#[derive(Clone, Debug)]
pub struct MaterialRegistry<M> {
    materials: HashMap<String, M>,
}

impl<M> Default for MaterialRegistry<M> {
    fn default() -> Self {
        Self {
            materials: HashMap::new(),
        }
    }
}

impl<M> MaterialRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, material: M) -> Option<M> {
        self.materials.insert(name.into(), material)
    }

    pub fn get(&self, name: &str) -> Option<&M> {
        self.materials.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    /// Material names in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.materials.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
