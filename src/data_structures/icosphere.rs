//! Procedural unit sphere built by subdividing an icosahedron.

use anyhow::{Result, ensure};
use cgmath::{InnerSpace, Vector3};

use crate::data_structures::orientation::SurfaceOrientation;

const X: f32 = 0.525731112119133606;
const Z: f32 = 0.850650808352039932;
const N: f32 = 0.0;

#[rustfmt::skip]
const ICOSAHEDRON_VERTICES: [f32; 36] = [
    -X,  N,  Z,   X,  N,  Z,  -X,  N, -Z,   X,  N, -Z,
     N,  Z,  X,   N,  Z, -X,   N, -Z,  X,   N, -Z, -X,
     Z,  X,  N,  -Z,  X,  N,   Z, -X,  N,  -Z, -X,  N,
];

#[rustfmt::skip]
const ICOSAHEDRON_TRIANGLES: [u16; 60] = [
    1, 4, 0,   4, 9, 0,   4, 5, 9,   8, 5, 4,   1, 8, 4,
    1, 10, 8,  10, 3, 8,  8, 3, 5,   3, 2, 5,   3, 7, 2,
    3, 10, 7,  10, 6, 7,  6, 11, 7,  6, 0, 11,  6, 1, 0,
    10, 1, 6,  11, 0, 9,  2, 11, 9,  5, 2, 9,   11, 2, 7,
];

/// Vertex count after `subdivisions` refinements of the base icosahedron.
///
/// Every refinement appends three fresh midpoints per source triangle.
pub const fn vertex_count(subdivisions: u32) -> u64 {
    let mut vertices = 12u64;
    let mut triangles = 20u64;
    let mut i = 0;
    while i < subdivisions {
        vertices += 3 * triangles;
        triangles *= 4;
        i += 1;
    }
    vertices
}

/// Triangle count after `subdivisions` refinements: `20 * 4^n`.
pub const fn triangle_count(subdivisions: u32) -> u64 {
    20 * 4u64.pow(subdivisions)
}

/// A unit sphere with positions, 16-bit triangle indices and packed tangent
/// frames.
///
/// Since the sphere has radius one, the normals equal the positions and are
/// not stored separately.
#[derive(Clone, Debug, PartialEq)]
pub struct IcoSphere {
    vertices: Vec<f32>,
    triangles: Vec<u16>,
    tangents: Vec<i16>,
}

impl IcoSphere {
    /// Refine the base icosahedron `subdivisions` times and compute tangents.
    ///
    /// Fails when the result would not be addressable by `u16` indices.
    pub fn new(subdivisions: u32) -> Result<Self> {
        let vertices = vertex_count(subdivisions);
        ensure!(
            vertices <= u16::MAX as u64 + 1,
            "{} subdivisions produce {} vertices, more than 16-bit indices can address",
            subdivisions,
            vertices
        );

        let mut sphere = Self {
            vertices: ICOSAHEDRON_VERTICES.to_vec(),
            triangles: ICOSAHEDRON_TRIANGLES.to_vec(),
            tangents: Vec::new(),
        };
        for _ in 0..subdivisions {
            sphere.subdivide_positions();
        }
        sphere.compute_tangents()?;
        log::debug!(
            "icosphere: {} subdivisions, {} vertices, {} triangles",
            subdivisions,
            sphere.vertex_count(),
            sphere.triangle_count()
        );
        Ok(sphere)
    }

    /// Split every triangle into four and recompute the tangents.
    pub fn subdivide(&mut self) -> Result<()> {
        let next = self.vertex_count() + 3 * self.triangle_count();
        ensure!(
            next <= u16::MAX as usize + 1,
            "subdividing would produce {} vertices, more than 16-bit indices can address",
            next
        );
        self.subdivide_positions();
        self.compute_tangents()
    }

    fn subdivide_positions(&mut self) {
        let src_vertex_count = self.vertices.len() / 3;
        let src_triangle_count = self.triangles.len() / 3;

        let mut vertices = Vec::with_capacity((src_vertex_count + src_triangle_count * 3) * 3);
        vertices.extend_from_slice(&self.vertices);
        let mut triangles = Vec::with_capacity(src_triangle_count * 12);

        let position = |i: u16| {
            let i = i as usize * 3;
            Vector3::new(self.vertices[i], self.vertices[i + 1], self.vertices[i + 2])
        };

        for tri in self.triangles.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0], tri[1], tri[2]);
            let (v0, v1, v2) = (position(i0), position(i1), position(i2));

            // Index math stays in range: the constructor and `subdivide`
            // check the final vertex count against u16 first.
            let i3 = (vertices.len() / 3) as u16;
            let (i4, i5) = (i3 + 1, i3 + 2);
            for midpoint in [v0 + v1, v1 + v2, v2 + v0] {
                let m = midpoint.normalize();
                vertices.extend_from_slice(&[m.x, m.y, m.z]);
            }

            triangles.extend_from_slice(&[
                i0, i3, i5, //
                i3, i1, i4, //
                i5, i3, i4, //
                i2, i5, i4,
            ]);
        }

        self.vertices = vertices;
        self.triangles = triangles;
    }

    fn compute_tangents(&mut self) -> Result<()> {
        let normals: Vec<[f32; 3]> = self
            .vertices
            .chunks_exact(3)
            .map(|v| [v[0], v[1], v[2]])
            .collect();
        let orientation = SurfaceOrientation::from_normals(&normals)?;
        self.tangents = orientation.quats_snorm16().into_iter().flatten().collect();
        Ok(())
    }

    /// Positions as xyz triples.
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    /// Triangle list, three indices per triangle.
    pub fn triangles(&self) -> &[u16] {
        &self.triangles
    }

    /// Tangent quaternions as snorm16 xyzw quadruples, one per vertex.
    pub fn tangents(&self) -> &[i16] {
        &self.tangents
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }
}
