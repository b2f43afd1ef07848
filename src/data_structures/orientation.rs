//! Per-vertex tangent frames encoded as quaternions.
//!
//! Shading needs a full tangent frame per vertex, but storing tangent,
//! bitangent and normal costs 36 bytes. A [`SurfaceOrientation`] computes the
//! frames once and hands them out as quaternions (or as 8-byte snorm16x4
//! values ready for a vertex buffer).

use anyhow::{Result, ensure};
use cgmath::{InnerSpace, Matrix3, Quaternion, Vector2, Vector3};

use crate::packing::{pack_tangent_frame, quat_to_snorm16};

#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceOrientation {
    quats: Vec<Quaternion<f32>>,
}

impl SurfaceOrientation {
    /// Build frames from normals alone.
    ///
    /// The tangent is an arbitrary unit vector perpendicular to the normal,
    /// which is enough for isotropic materials without normal maps.
    pub fn from_normals(normals: &[[f32; 3]]) -> Result<Self> {
        ensure!(!normals.is_empty(), "surface orientation needs at least one normal");
        let quats = normals
            .iter()
            .map(|n| pack_tangent_frame(frame_around(unit_or_z(Vector3::from(*n)))))
            .collect();
        Ok(Self { quats })
    }

    /// Build frames whose tangents follow the texture's u direction.
    ///
    /// `indices` is a triangle list into the other slices. Tangents and
    /// bitangents are accumulated per triangle and averaged per vertex.
    /// Vertices that end up with no usable tangent fall back to the
    /// normal-only frame.
    pub fn from_uvs(
        positions: &[[f32; 3]],
        normals: &[[f32; 3]],
        uvs: &[[f32; 2]],
        indices: &[u32],
    ) -> Result<Self> {
        let vertex_count = positions.len();
        ensure!(vertex_count > 0, "surface orientation needs at least one vertex");
        ensure!(
            normals.len() == vertex_count && uvs.len() == vertex_count,
            "mismatched attribute counts: {} positions, {} normals, {} uvs",
            vertex_count,
            normals.len(),
            uvs.len()
        );
        ensure!(
            indices.len() % 3 == 0,
            "index count {} is not a multiple of 3",
            indices.len()
        );
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            anyhow::bail!("index {} out of range for {} vertices", bad, vertex_count);
        }

        let mut tangents = vec![Vector3::new(0.0f32, 0.0, 0.0); vertex_count];
        let mut bitangents = vec![Vector3::new(0.0f32, 0.0, 0.0); vertex_count];

        for c in indices.chunks(3) {
            let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);

            let pos0 = Vector3::from(positions[i0]);
            let pos1 = Vector3::from(positions[i1]);
            let pos2 = Vector3::from(positions[i2]);

            let uv0 = Vector2::from(uvs[i0]);
            let uv1 = Vector2::from(uvs[i1]);
            let uv2 = Vector2::from(uvs[i2]);

            let delta_pos1 = pos1 - pos0;
            let delta_pos2 = pos2 - pos0;
            let delta_uv1 = uv1 - uv0;
            let delta_uv2 = uv2 - uv0;

            // Solves delta_pos = delta_uv.x * T + delta_uv.y * B for both edges.
            let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
            let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * r;

            for i in [i0, i1, i2] {
                tangents[i] += tangent;
                bitangents[i] += bitangent;
            }
        }

        let quats = (0..vertex_count)
            .map(|i| {
                let n = unit_or_z(Vector3::from(normals[i]));
                let t = tangents[i] - n * n.dot(tangents[i]);
                if t.magnitude2() <= f32::EPSILON {
                    return pack_tangent_frame(frame_around(n));
                }
                let t = t.normalize();
                let mut b = n.cross(t);
                if b.dot(bitangents[i]) < 0.0 {
                    b = -b;
                }
                pack_tangent_frame(Matrix3::from_cols(t, b, n))
            })
            .collect();

        Ok(Self { quats })
    }

    pub fn vertex_count(&self) -> usize {
        self.quats.len()
    }

    pub fn quats(&self) -> &[Quaternion<f32>] {
        &self.quats
    }

    /// Quaternions packed as snorm16 in xyzw order.
    pub fn quats_snorm16(&self) -> Vec<[i16; 4]> {
        self.quats.iter().copied().map(quat_to_snorm16).collect()
    }
}

fn unit_or_z(n: Vector3<f32>) -> Vector3<f32> {
    if n.magnitude2() <= f32::EPSILON {
        Vector3::unit_z()
    } else {
        n.normalize()
    }
}

fn frame_around(n: Vector3<f32>) -> Matrix3<f32> {
    let reference = if n.x.abs() < 0.9 {
        Vector3::unit_x()
    } else {
        Vector3::unit_y()
    };
    let b = n.cross(reference).normalize();
    let t = b.cross(n);
    Matrix3::from_cols(t, b, n)
}
