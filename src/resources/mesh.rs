use std::io::{BufReader, Cursor};

use anyhow::{Context as _, Result, ensure};
use cgmath::{InnerSpace, Vector3};

use crate::data_structures::{
    buffer::BufferDescriptor,
    mesh::{DEFAULT_MATERIAL, IndexType, MaterialRegistry, MeshVertex},
    orientation::SurfaceOrientation,
};
use crate::engine::Engine;

/// A contiguous index range drawn with one material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshPart {
    pub name: String,
    pub material: String,
    /// First index of the part in the shared index buffer.
    pub offset: u32,
    pub count: u32,
}

/// Axis-aligned bounds of a mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    fn empty() -> Self {
        Self {
            min: [f32::MAX; 3],
            max: [f32::MIN; 3],
        }
    }

    fn extend(&mut self, p: [f32; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    pub fn center(&self) -> [f32; 3] {
        [0, 1, 2].map(|a| (self.min[a] + self.max[a]) * 0.5)
    }

    pub fn half_extent(&self) -> [f32; 3] {
        [0, 1, 2].map(|a| (self.max[a] - self.min[a]) * 0.5)
    }
}

pub struct LoadedMesh<E: Engine> {
    pub vertex_buffer: E::VertexBuffer,
    pub index_buffer: E::IndexBuffer,
    pub vertex_count: u32,
    pub index_count: u32,
    pub parts: Vec<MeshPart>,
    pub aabb: Aabb,
}

/// Load an OBJ mesh into one interleaved vertex buffer and one index buffer.
///
/// Every object in the file becomes a [`MeshPart`]. Material names the
/// registry does not know yet are bound to `default_material`; when no
/// default is given they are left unbound and a warning is logged.
pub fn load_obj_mesh<E, M>(
    engine: &mut E,
    obj: &[u8],
    mtl: Option<&[u8]>,
    default_material: Option<M>,
    materials: &mut MaterialRegistry<M>,
) -> Result<LoadedMesh<E>>
where
    E: Engine,
    M: Clone,
{
    let mut reader = BufReader::new(Cursor::new(obj));
    let (models, obj_materials) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |path| match mtl {
            Some(bytes) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(bytes))),
            None => {
                log::warn!("No material library supplied for {}", path.display());
                Ok(Default::default())
            }
        },
    )
    .context("failed to parse OBJ mesh")?;
    let obj_materials = obj_materials.unwrap_or_else(|e| {
        log::warn!("Ignoring material library: {e}");
        Vec::new()
    });
    ensure!(!models.is_empty(), "OBJ mesh contains no objects");

    let mut vertices: Vec<MeshVertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut parts = Vec::with_capacity(models.len());
    let mut aabb = Aabb::empty();

    for model in &models {
        let mesh = &model.mesh;
        if mesh.indices.is_empty() {
            log::warn!("Skipping object '{}' without faces", model.name);
            continue;
        }
        let base = u32::try_from(vertices.len()).context("mesh has too many vertices")?;
        let part_vertices = build_vertices(mesh)
            .with_context(|| format!("invalid geometry in object '{}'", model.name))?;
        for v in &part_vertices {
            aabb.extend(v.position);
        }
        vertices.extend(part_vertices);

        let material = mesh
            .material_id
            .and_then(|id| obj_materials.get(id))
            .map_or(DEFAULT_MATERIAL, |m| m.name.as_str())
            .to_string();
        parts.push(MeshPart {
            name: model.name.clone(),
            material,
            offset: indices.len() as u32,
            count: mesh.indices.len() as u32,
        });
        indices.extend(mesh.indices.iter().map(|i| base + i));
    }
    ensure!(!indices.is_empty(), "OBJ mesh contains no faces");

    for part in &parts {
        if materials.contains(&part.material) {
            continue;
        }
        match &default_material {
            Some(material) => {
                materials.set(part.material.clone(), material.clone());
            }
            None => log::warn!(
                "Material '{}' of part '{}' has no instance",
                part.material,
                part.name
            ),
        }
    }

    let vertex_count = vertices.len() as u32;
    let vertex_buffer = engine.create_vertex_buffer(
        &MeshVertex::layout(),
        vertex_count,
        BufferDescriptor::from_slice(&vertices)?,
    )?;
    let index_buffer =
        engine.create_index_buffer(IndexType::UInt, BufferDescriptor::from_slice(&indices)?)?;

    log::info!(
        "Loaded OBJ mesh with {} vertices, {} triangles and {} parts",
        vertex_count,
        indices.len() / 3,
        parts.len()
    );
    Ok(LoadedMesh {
        vertex_buffer,
        index_buffer,
        vertex_count,
        index_count: indices.len() as u32,
        parts,
        aabb,
    })
}

fn build_vertices(mesh: &tobj::Mesh) -> Result<Vec<MeshVertex>> {
    let positions: Vec<[f32; 3]> = mesh
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    let count = positions.len();
    // Flip v so the first texel row is the top of the image.
    let uvs: Vec<[f32; 2]> = mesh
        .texcoords
        .chunks_exact(2)
        .map(|t| [t[0], 1.0 - t[1]])
        .collect();
    let has_uvs = uvs.len() == count;

    let normals: Vec<[f32; 3]> = if mesh.normals.len() == mesh.positions.len() {
        mesh.normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect()
    } else {
        face_normals(&positions, &mesh.indices)
    };

    let orientation = if has_uvs {
        SurfaceOrientation::from_uvs(&positions, &normals, &uvs, &mesh.indices)?
    } else {
        SurfaceOrientation::from_normals(&normals)?
    };

    Ok(positions
        .iter()
        .zip(orientation.quats_snorm16())
        .enumerate()
        .map(|(i, (position, tangents))| MeshVertex {
            position: *position,
            tangents,
            uv0: if has_uvs { uvs[i] } else { [0.0; 2] },
        })
        .collect())
}

/// Area-weighted vertex normals for meshes that ship without any.
fn face_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let p0 = Vector3::from(positions[a]);
        let n = (Vector3::from(positions[b]) - p0).cross(Vector3::from(positions[c]) - p0);
        sums[a] += n;
        sums[b] += n;
        sums[c] += n;
    }
    sums.into_iter()
        .map(|n| {
            if n.magnitude2() > 0.0 {
                n.normalize().into()
            } else {
                [0.0, 0.0, 1.0]
            }
        })
        .collect()
}
